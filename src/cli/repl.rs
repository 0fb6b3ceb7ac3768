//! REPL implementation
//!
//! This module implements the interactive admin shell.

use crate::cli::commands::{self, format_error, Command, Session};
use crate::database::schema::Table;
use crate::error::{Result, StoreError};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::Context;
use rustyline::Helper;
use rustyline::{CompletionType, Config, Editor};
use std::path::PathBuf;
use tracing::debug;

const COMMANDS: [&str; 11] = [
    "/connect", "/init", "/chunk", "/get", "/fetch", "/getch", "/stats", "/tables", "/help",
    "/quit", "/exit",
];

/// Completes command names, then table names
struct ShellCompleter;

impl ShellCompleter {
    fn candidates(line: &str) -> (usize, Vec<String>) {
        if !line.starts_with('/') {
            return (0, Vec::new());
        }
        match line.rfind(' ') {
            None => (
                0,
                COMMANDS
                    .iter()
                    .filter(|cmd| cmd.starts_with(line))
                    .map(|cmd| cmd.to_string())
                    .collect(),
            ),
            Some(space) => {
                let word = &line[space + 1..];
                let tables = Table::ALL
                    .iter()
                    .map(|table| table.name())
                    .filter(|name| name.starts_with(word))
                    .map(str::to_string)
                    .collect();
                (space + 1, tables)
            }
        }
    }
}

impl Completer for ShellCompleter {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> std::result::Result<(usize, Vec<String>), ReadlineError> {
        Ok(Self::candidates(&line[..pos]))
    }
}

impl Hinter for ShellCompleter {
    type Hint = String;
}

impl Highlighter for ShellCompleter {}

impl Validator for ShellCompleter {}

impl Helper for ShellCompleter {}

/// Admin shell
pub struct Repl {
    /// The rustyline editor
    editor: Editor<ShellCompleter, DefaultHistory>,
    /// Whether the REPL should continue running
    running: bool,
    /// Store the commands run against
    session: Session,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(session: Session) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .auto_add_history(true)
            .build();

        let mut editor = Editor::<ShellCompleter, DefaultHistory>::with_config(config)
            .map_err(|e| StoreError::Config(format!("failed to initialize editor: {}", e)))?;
        editor.set_helper(Some(ShellCompleter));

        let history_path = dirs::data_dir()
            .map(|p| p.join("guild-store").join("history"))
            .unwrap_or_else(|| ".guild-store-history".into());

        if let Err(e) = editor.load_history(&history_path) {
            debug!(error = %e, "No shell history loaded");
        }

        Ok(Self {
            editor,
            running: true,
            session,
            history_path,
        })
    }

    /// Run the REPL loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        while self.running {
            match self.editor.readline("guild-store> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match Command::parse(line) {
                        Ok(command) => self.handle_command(command).await,
                        Err(e) => println!("{}", format_error(&e)),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    self.running = false;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    self.running = false;
                }
            }
        }

        if let Some(parent) = self.history_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Err(e) = self.editor.save_history(&self.history_path) {
            debug!(error = %e, "Could not save shell history");
        }
        self.session.store().close().await;
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("Guild-Store admin shell v{}", env!("CARGO_PKG_VERSION"));
        println!("Type /help for available commands.");
        println!();
    }

    /// Handle a command
    async fn handle_command(&mut self, command: Command) {
        if command.command_type == commands::CommandType::Quit {
            self.running = false;
        }
        match commands::handle_command(&command, &self.session).await {
            Ok(msg) => println!("{}", msg),
            Err(e) => println!("{}", format_error(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_command_names() {
        let (start, found) = ShellCompleter::candidates("/ge");
        assert_eq!(start, 0);
        assert_eq!(found, vec!["/get".to_string(), "/getch".to_string()]);
    }

    #[test]
    fn test_complete_table_names() {
        let (start, found) = ShellCompleter::candidates("/fetch gu");
        assert_eq!(start, 7);
        assert_eq!(found, vec!["guilds".to_string(), "guild_blacklist".to_string()]);
    }

    #[test]
    fn test_plain_text_has_no_completions() {
        assert!(ShellCompleter::candidates("select").1.is_empty());
    }
}
