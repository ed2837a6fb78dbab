//! Gold price tools backed by a third-party market-data provider.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthStr;

use crate::config::MarketConfig;
use crate::tools::{Tool, ToolOutput, empty_schema};

#[derive(Debug, Clone, PartialEq)]
pub struct SpotQuote {
    pub time: String,
    pub price: String,
    pub symbol: String,
    pub updated: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub date: NaiveDate,
    pub product: String,
    pub open: String,
    pub close: String,
}

#[async_trait::async_trait]
pub trait MarketData: Send + Sync {
    async fn spot_quotes(&self) -> Result<Vec<SpotQuote>>;

    /// Daily report rows for every gold product, in provider order.
    async fn history(&self) -> Result<Vec<HistoryRecord>>;

    fn history_product(&self) -> &str;

    fn history_limit(&self) -> usize;
}

#[derive(Debug, Deserialize)]
struct SpotResponse {
    #[serde(default)]
    times: Vec<JsonValue>,
    #[serde(default)]
    data: Vec<JsonValue>,
    #[serde(default)]
    delaystr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    data: HistoryData,
}

#[derive(Debug, Deserialize)]
struct HistoryData {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

// report row layout: date, product, open, high, low, close, ...
const COL_DATE: usize = 0;
const COL_PRODUCT: usize = 1;
const COL_OPEN: usize = 2;
const COL_CLOSE: usize = 5;

fn cell(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct HttpMarketData {
    cfg: MarketConfig,
    inner: reqwest::Client,
}

impl HttpMarketData {
    pub fn new(cfg: MarketConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .build()
            .context("build market data http client")?;
        Ok(Self { cfg, inner })
    }
}

#[async_trait::async_trait]
impl MarketData for HttpMarketData {
    async fn spot_quotes(&self) -> Result<Vec<SpotQuote>> {
        debug!(url=%self.cfg.spot_url, symbol=%self.cfg.spot_symbol, "fetching spot quotes");
        let resp = self
            .inner
            .post(&self.cfg.spot_url)
            .form(&[("instid", self.cfg.spot_symbol.as_str())])
            .send()
            .await
            .context("send spot quotation request")?;
        if !resp.status().is_success() {
            bail!("spot quotation error: {}", resp.status());
        }
        let body: SpotResponse = resp.json().await.context("parse spot quotations")?;
        let updated = body.delaystr.unwrap_or_default();
        Ok(body
            .times
            .iter()
            .zip(body.data.iter())
            .map(|(t, p)| SpotQuote {
                time: cell(t),
                price: cell(p),
                symbol: self.cfg.spot_symbol.clone(),
                updated: updated.clone(),
            })
            .collect())
    }

    async fn history(&self) -> Result<Vec<HistoryRecord>> {
        debug!(url=%self.cfg.history_url, "fetching gold price report");
        let resp = self
            .inner
            .get(&self.cfg.history_url)
            .query(&[("category", "au"), ("attr_id", "1")])
            .send()
            .await
            .context("send gold report request")?;
        if !resp.status().is_success() {
            bail!("gold report error: {}", resp.status());
        }
        let body: HistoryResponse = resp.json().await.context("parse gold report")?;
        let mut records = Vec::with_capacity(body.data.values.len());
        for row in body.data.values {
            if row.len() <= COL_CLOSE {
                warn!(?row, "skipping short gold report row");
                continue;
            }
            let raw_date = cell(&row[COL_DATE]);
            let Ok(date) = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d") else {
                warn!(date=%raw_date, "skipping gold report row with bad date");
                continue;
            };
            records.push(HistoryRecord {
                date,
                product: cell(&row[COL_PRODUCT]),
                open: cell(&row[COL_OPEN]),
                close: cell(&row[COL_CLOSE]),
            });
        }
        Ok(records)
    }

    fn history_product(&self) -> &str {
        &self.cfg.history_product
    }

    fn history_limit(&self) -> usize {
        self.cfg.history_limit
    }
}

/// Renders rows as a left-aligned, space-padded text table.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (i, c) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(c.width());
            }
        }
    }
    let fmt_row = |cells: Vec<&str>| {
        let mut line = String::new();
        for (i, c) in cells.iter().enumerate() {
            if i > 0 {
                line.push_str("  ");
            }
            line.push_str(c);
            if i + 1 < cells.len() {
                line.push_str(&" ".repeat(widths[i].saturating_sub(c.width())));
            }
        }
        line
    };
    let mut lines = vec![fmt_row(headers.to_vec())];
    for row in rows {
        lines.push(fmt_row(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

pub struct GetGoldPriceTool {
    market: Arc<dyn MarketData>,
}

impl GetGoldPriceTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait::async_trait]
impl Tool for GetGoldPriceTool {
    fn name(&self) -> &str {
        "getGoldPrice"
    }

    fn description(&self) -> &str {
        "Get the current spot gold price quotations."
    }

    fn input_schema(&self) -> JsonValue {
        empty_schema()
    }

    async fn call(&self, _args: &JsonValue) -> Result<ToolOutput> {
        let quotes = self.market.spot_quotes().await?;
        if quotes.is_empty() {
            return Ok(ToolOutput::new("no spot quotations available"));
        }
        let rows: Vec<Vec<String>> = quotes
            .into_iter()
            .map(|q| vec![q.time, q.price, q.symbol, q.updated])
            .collect();
        Ok(ToolOutput::new(render_table(
            &["time", "price", "symbol", "updated"],
            &rows,
        )))
    }
}

pub struct GetHistoryGoldPriceTool {
    market: Arc<dyn MarketData>,
}

impl GetHistoryGoldPriceTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait::async_trait]
impl Tool for GetHistoryGoldPriceTool {
    fn name(&self) -> &str {
        "GetHistoryGoldPrice"
    }

    fn description(&self) -> &str {
        "Get recent daily gold prices (open and close), newest first."
    }

    fn input_schema(&self) -> JsonValue {
        empty_schema()
    }

    async fn call(&self, _args: &JsonValue) -> Result<ToolOutput> {
        let product = self.market.history_product().to_string();
        let mut records: Vec<HistoryRecord> = self
            .market
            .history()
            .await?
            .into_iter()
            .filter(|r| r.product == product)
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));
        records.truncate(self.market.history_limit());
        if records.is_empty() {
            return Ok(ToolOutput::new(format!("no price history for {product}")));
        }
        let rows: Vec<Vec<String>> = records
            .into_iter()
            .map(|r| vec![r.date.to_string(), r.product, r.open, r.close])
            .collect();
        Ok(ToolOutput::new(render_table(
            &["date", "product", "open", "close"],
            &rows,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use serde_json::json;

    struct FakeMarket {
        history: Vec<HistoryRecord>,
        limit: usize,
    }

    #[async_trait::async_trait]
    impl MarketData for FakeMarket {
        async fn spot_quotes(&self) -> Result<Vec<SpotQuote>> {
            Ok(vec![SpotQuote {
                time: "09:00".into(),
                price: "560.12".into(),
                symbol: "Au99.99".into(),
                updated: "2025-03-14 09:00".into(),
            }])
        }

        async fn history(&self) -> Result<Vec<HistoryRecord>> {
            Ok(self.history.clone())
        }

        fn history_product(&self) -> &str {
            "Au100g"
        }

        fn history_limit(&self) -> usize {
            self.limit
        }
    }

    fn record(day: u32, product: &str) -> HistoryRecord {
        HistoryRecord {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            product: product.into(),
            open: format!("{day}.0"),
            close: format!("{day}.5"),
        }
    }

    fn market_config(server: &Server) -> MarketConfig {
        MarketConfig {
            spot_url: server.url_str("/graph/quotations"),
            history_url: server.url_str("/reports/list"),
            ..MarketConfig::default()
        }
    }

    #[test]
    fn table_columns_are_aligned() {
        let out = render_table(
            &["a", "bb"],
            &[vec!["xxx".into(), "1".into()], vec!["y".into(), "22".into()]],
        );
        assert_eq!(out, "a    bb\nxxx  1\ny    22");
    }

    #[tokio::test]
    async fn history_filters_sorts_newest_first_and_limits() {
        let market = Arc::new(FakeMarket {
            history: vec![
                record(1, "Au100g"),
                record(3, "Au99.99"),
                record(5, "Au100g"),
                record(2, "Au100g"),
            ],
            limit: 2,
        });
        let out = GetHistoryGoldPriceTool::new(market)
            .call(&json!({}))
            .await
            .unwrap();
        let lines: Vec<_> = out.text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date"));
        assert!(lines[1].starts_with("2025-01-05"));
        assert!(lines[2].starts_with("2025-01-02"));
        assert!(!out.text.contains("Au99.99"));
    }

    #[tokio::test]
    async fn spot_tool_renders_quotes() {
        let market = Arc::new(FakeMarket {
            history: vec![],
            limit: 60,
        });
        let out = GetGoldPriceTool::new(market).call(&json!({})).await.unwrap();
        assert!(out.text.starts_with("time"));
        assert!(out.text.contains("560.12"));
    }

    #[tokio::test]
    async fn http_spot_quotes_are_zipped() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/graph/quotations")).respond_with(
                json_encoded(json!({
                    "times": ["09:00", "09:01"],
                    "data": [560.1, "560.3"],
                    "delaystr": "2025-03-14 09:01"
                })),
            ),
        );
        let market = HttpMarketData::new(market_config(&server)).unwrap();
        let quotes = market.spot_quotes().await.unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].price, "560.1");
        assert_eq!(quotes[1].price, "560.3");
        assert_eq!(quotes[1].updated, "2025-03-14 09:01");
    }

    #[tokio::test]
    async fn http_history_skips_bad_rows() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/reports/list")).respond_with(
                json_encoded(json!({
                    "data": {
                        "values": [
                            ["2025-01-02", "Au100g", "560", "565", "559", "563"],
                            ["not-a-date", "Au100g", "1", "1", "1", "1"],
                            ["2025-01-03", "Au100g"]
                        ]
                    }
                })),
            ),
        );
        let market = HttpMarketData::new(market_config(&server)).unwrap();
        let records = market.history().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].open, "560");
        assert_eq!(records[0].close, "563");
    }

    #[tokio::test]
    async fn http_provider_error_is_reported() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/graph/quotations"))
                .respond_with(status_code(503)),
        );
        let market = HttpMarketData::new(market_config(&server)).unwrap();
        let err = market.spot_quotes().await.unwrap_err();
        assert!(format!("{err}").contains("503"));
    }
}
