use std::io::{self, Write};

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::{Command, clear_screen, parse_command, print_help, print_tools};
use crate::context::AppContext;
use crate::llm::{AgentEvent, ChatAgent, ChatMessage};

pub async fn run_console(ctx: AppContext) -> Result<()> {
    let agent = ctx.agent(Some(ctx.config.system_prompt.clone()));
    info!(model = %ctx.config.model, "console session started");
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    run_session(&agent, &ctx.config.model, stdin, &mut stdout).await
}

/// Reads lines from `input` until EOF or `/quit`, streaming replies to `out`.
pub async fn run_session<R, W>(agent: &ChatAgent, model: &str, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut history: Vec<ChatMessage> = Vec::new();

    loop {
        write!(out, "You: ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        match parse_command(&line) {
            Command::Quit => break,
            Command::Empty => continue,
            Command::Help => print_help(out)?,
            Command::Tools => print_tools(out, agent.registry())?,
            Command::Clear => clear_screen(out)?,
            Command::Reset => {
                history.clear();
                writeln!(out, "(conversation reset)")?;
            }
            Command::Message(text) => {
                history.push(ChatMessage::user(text));
                let (tx, mut rx) = mpsc::unbounded_channel();
                let turn = async {
                    let tx = tx;
                    agent.run_turn(&mut history, model, Some(&tx)).await
                };
                let printer = async {
                    while let Some(ev) = rx.recv().await {
                        match ev {
                            AgentEvent::Delta(d) => {
                                write!(out, "{d}")?;
                                out.flush()?;
                            }
                            AgentEvent::ToolDispatched { name, arguments } => {
                                eprintln!("[tool] {name}({arguments})");
                            }
                        }
                    }
                    Ok::<(), io::Error>(())
                };
                let (result, printed) = tokio::join!(turn, printer);
                printed?;
                writeln!(out)?;
                if let Err(e) = result {
                    error!(error = %e, "turn failed");
                    writeln!(out, "Error: {e}")?;
                }
            }
        }
    }
    Ok(())
}
