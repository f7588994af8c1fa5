mod command;

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub use command::ConsoleCommand;

use crate::leaderboard::{LeaderboardManager, PresentationSink, ScoreInput, TextSink};
use crate::Error;

/// Prints every rendered leaderboard to stdout and keeps it for `list`.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    screen: TextSink,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn print(text: &str) {
        let mut out = std::io::stdout().lock();
        let body = if text.is_empty() { "(no scores yet)" } else { text };
        // A closed stdout leaves nothing to render to.
        let _ = writeln!(out, "--- leaderboard ---\n{body}\n-------------------");
    }
}

impl PresentationSink for ConsoleSink {
    fn render(&self, text: &str) {
        self.screen.render(text);
        Self::print(text);
    }
}

/// The name and score fields filled in with `name` / `score` before `submit`.
#[derive(Debug, Default)]
pub struct InputFields {
    name: Mutex<String>,
    score: Mutex<String>,
}

impl InputFields {
    pub fn set_name(&self, text: impl Into<String>) {
        *self.name.lock().unwrap_or_else(PoisonError::into_inner) = text.into();
    }

    pub fn set_score(&self, text: impl Into<String>) {
        *self.score.lock().unwrap_or_else(PoisonError::into_inner) = text.into();
    }
}

impl ScoreInput for InputFields {
    fn name_text(&self) -> String {
        self.name.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn score_text(&self) -> String {
        self.score.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run(manager: &LeaderboardManager, sink: &ConsoleSink) -> Result<(), Error> {
    let fields = InputFields::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", command::HELP);
    while let Some(line) = lines.next_line().await? {
        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        if command == ConsoleCommand::Quit {
            break;
        }
        execute(manager, sink, &fields, command).await;
    }

    info!("Console input closed");
    Ok(())
}

async fn execute(
    manager: &LeaderboardManager,
    sink: &ConsoleSink,
    fields: &InputFields,
    command: ConsoleCommand,
) {
    let result = match command {
        ConsoleCommand::Add { name, score } => manager.add_score(name, score).await,
        ConsoleCommand::SetName(text) => {
            fields.set_name(text);
            Ok(())
        }
        ConsoleCommand::SetScore(text) => {
            fields.set_score(text);
            Ok(())
        }
        ConsoleCommand::Submit => manager.add_score_from(fields).await,
        ConsoleCommand::Refresh => manager.retrieve_up_to_date_scores().await,
        ConsoleCommand::Clear => manager.clear_list().await,
        ConsoleCommand::List => {
            ConsoleSink::print(&sink.screen.text());
            Ok(())
        }
        ConsoleCommand::Help | ConsoleCommand::Quit => {
            println!("{}", command::HELP);
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!(error = %e, "Leaderboard command failed");
        println!("error: {e}");
    }
}
