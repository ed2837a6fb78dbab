mod repl;

pub use repl::{run_console, run_session};

use std::io::{self, Write};

use crate::tools::ToolRegistry;

/// What one line of console input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    Tools,
    Clear,
    Reset,
    Empty,
    Message(String),
}

pub fn parse_command(line: &str) -> Command {
    match line.trim() {
        "" => Command::Empty,
        "/quit" | "/exit" => Command::Quit,
        "/help" => Command::Help,
        "/tools" => Command::Tools,
        "/clear" => Command::Clear,
        "/reset" => Command::Reset,
        other => Command::Message(other.to_string()),
    }
}

pub fn print_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "/help   Show help\n/tools  List available tools\n/reset  Forget the conversation so far\n/clear  Clear screen\n/quit   Quit (also /exit)"
    )
}

pub fn print_tools(out: &mut impl Write, registry: &ToolRegistry) -> io::Result<()> {
    for spec in registry.list_specs() {
        writeln!(out, "{:<20} {}", spec.function.name, spec.function.description)?;
    }
    Ok(())
}

pub fn clear_screen(out: &mut impl Write) -> io::Result<()> {
    write!(out, "\x1B[2J\x1B[H")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::GetWeatherTool;
    use std::sync::Arc;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command(" /quit "), Command::Quit);
        assert_eq!(parse_command("/reset"), Command::Reset);
        assert_eq!(parse_command("   "), Command::Empty);
        assert_eq!(
            parse_command("gold price today?"),
            Command::Message("gold price today?".into())
        );
    }

    #[test]
    fn lists_tools_with_descriptions() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(GetWeatherTool)).unwrap();
        let mut out = Vec::new();
        print_tools(&mut out, &registry).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("getWeather"));
    }
}
