use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::llm::{DEFAULT_HISTORY_WINDOW, DEFAULT_MAX_TOOL_ROUNDS};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub history_window: usize,
    pub max_tool_rounds: usize,
    // prefixed to console sessions only
    pub system_prompt: String,
    pub location: String,
    pub server: ServerConfig,
    pub email: EmailConfig,
    pub market: MarketConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            history_window: DEFAULT_HISTORY_WINDOW,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            location: "Tianjin".to_string(),
            server: ServerConfig::default(),
            email: EmailConfig::default(),
            market: MarketConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sender: Option<String>,
    pub password: Option<String>,
    pub recipient: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub subject_prefix: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sender: None,
            password: None,
            recipient: None,
            smtp_host: "smtp.qq.com".to_string(),
            smtp_port: 465,
            subject_prefix: "Finance AI: ".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub spot_url: String,
    pub spot_symbol: String,
    pub history_url: String,
    pub history_product: String,
    pub history_limit: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            spot_url: "https://www.sge.com.cn/graph/quotations".to_string(),
            spot_symbol: "Au99.99".to_string(),
            history_url: "https://datacenter-api.jin10.com/reports/list".to_string(),
            history_product: "Au100g".to_string(),
            history_limit: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub history_window: Option<usize>,
    pub max_tool_rounds: Option<usize>,
    pub system_prompt: Option<String>,
    pub location: Option<String>,
    pub server: Option<PartialServerConfig>,
    pub email: Option<PartialEmailConfig>,
    pub market: Option<PartialMarketConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialServerConfig {
    pub addr: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialEmailConfig {
    pub sender: Option<String>,
    pub password: Option<String>,
    pub recipient: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub subject_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialMarketConfig {
    pub spot_url: Option<String>,
    pub spot_symbol: Option<String>,
    pub history_url: Option<String>,
    pub history_product: Option<String>,
    pub history_limit: Option<usize>,
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub addr: Option<String>,
}

impl AppConfig {
    pub fn from_cli(overrides: ConfigOverrides) -> Result<Self> {
        let file_cfg = load_file_config().unwrap_or_default();
        Self::resolve(overrides, |key| std::env::var(key).ok(), file_cfg)
    }

    /// Merges CLI overrides, environment, and the config file over the defaults.
    pub fn resolve<F>(overrides: ConfigOverrides, env: F, file_cfg: FileConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_any = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| env(*k).filter(|v| !v.trim().is_empty()))
        };
        let env_num = |key: &str| -> Result<Option<usize>> {
            env_any(&[key])
                .map(|v| {
                    v.trim()
                        .parse::<usize>()
                        .with_context(|| format!("invalid {key}: {v}"))
                })
                .transpose()
        };
        let defaults = AppConfig::default();

        let base_url = overrides
            .base_url
            .or_else(|| env_any(&["OPENAI_BASE_URL", "openai_base_url"]))
            .or(file_cfg.base_url)
            .unwrap_or(defaults.base_url);
        let api_key = overrides
            .api_key
            .or_else(|| env_any(&["OPENAI_API_KEY", "openai_api_key"]))
            .or(file_cfg.api_key);
        let model = overrides
            .model
            .or_else(|| env_any(&["OPENAI_MODEL", "model"]))
            .or(file_cfg.model)
            .unwrap_or(defaults.model);

        let history_window = env_num("FINCHAT_HISTORY_WINDOW")?
            .or(file_cfg.history_window)
            .unwrap_or(defaults.history_window);
        if history_window == 0 {
            bail!("history_window must be at least 1");
        }
        let max_tool_rounds = env_num("FINCHAT_MAX_TOOL_ROUNDS")?
            .or(file_cfg.max_tool_rounds)
            .unwrap_or(defaults.max_tool_rounds);

        let system_prompt = env_any(&["FINCHAT_SYSTEM_PROMPT"])
            .or(file_cfg.system_prompt)
            .unwrap_or(defaults.system_prompt);
        let location = env_any(&["FINCHAT_LOCATION"])
            .or(file_cfg.location)
            .unwrap_or(defaults.location);

        let file_server = file_cfg.server.unwrap_or_default();
        let server = ServerConfig {
            addr: overrides
                .addr
                .or_else(|| env_any(&["FINCHAT_ADDR"]))
                .or(file_server.addr)
                .unwrap_or(defaults.server.addr),
        };

        let file_email = file_cfg.email.unwrap_or_default();
        let smtp_port = match env_any(&["EMAIL_SMTP_PORT"]) {
            Some(v) => Some(
                v.trim()
                    .parse::<u16>()
                    .with_context(|| format!("invalid EMAIL_SMTP_PORT: {v}"))?,
            ),
            None => file_email.smtp_port,
        };
        let email = EmailConfig {
            sender: env_any(&["EMAIL_SENDER", "email_sender"]).or(file_email.sender),
            password: env_any(&["EMAIL_KEY", "email_key"]).or(file_email.password),
            recipient: env_any(&["EMAIL_TO", "email_to"]).or(file_email.recipient),
            smtp_host: env_any(&["EMAIL_SMTP_HOST"])
                .or(file_email.smtp_host)
                .unwrap_or(defaults.email.smtp_host),
            smtp_port: smtp_port.unwrap_or(defaults.email.smtp_port),
            subject_prefix: file_email
                .subject_prefix
                .unwrap_or(defaults.email.subject_prefix),
        };

        let file_market = file_cfg.market.unwrap_or_default();
        let market = MarketConfig {
            spot_url: env_any(&["GOLD_SPOT_URL"])
                .or(file_market.spot_url)
                .unwrap_or(defaults.market.spot_url),
            spot_symbol: env_any(&["GOLD_SPOT_SYMBOL"])
                .or(file_market.spot_symbol)
                .unwrap_or(defaults.market.spot_symbol),
            history_url: env_any(&["GOLD_HISTORY_URL"])
                .or(file_market.history_url)
                .unwrap_or(defaults.market.history_url),
            history_product: file_market
                .history_product
                .unwrap_or(defaults.market.history_product),
            history_limit: file_market
                .history_limit
                .unwrap_or(defaults.market.history_limit),
        };

        if email.sender.is_none() || email.password.is_none() || email.recipient.is_none() {
            warn!("email settings incomplete; sendEmail will report failures");
        }

        Ok(Self {
            base_url,
            model,
            api_key,
            history_window,
            max_tool_rounds,
            system_prompt,
            location,
            server,
            email,
            market,
        })
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut v = Vec::new();
    if let Ok(p) = std::env::var("FINCHAT_CONFIG") {
        v.push(PathBuf::from(p));
    }
    if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
        v.push(Path::new(&xdg_home).join("finchat/config.toml"));
    } else if let Some(home) = dirs::home_dir() {
        v.push(home.join(".config/finchat/config.toml"));
    }
    v
}

pub fn load_file_config() -> Result<FileConfig> {
    for p in candidate_paths() {
        if p.exists() {
            match read_config_file(&p) {
                Ok(cfg) => {
                    info!(path=%p.display(), "loaded config file");
                    return Ok(cfg);
                }
                Err(e) => {
                    warn!(path=%p.display(), error=%format!("{e:#}"), "parse config failed");
                    continue;
                }
            }
        }
    }
    Ok(FileConfig::default())
}

pub fn read_config_file(path: &Path) -> Result<FileConfig> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    toml::from_str::<FileConfig>(&s)
        .with_context(|| format!("parse config file: {}", path.display()))
}
