use crate::fmt;

pub const HELP: &str = "\
commands:
  add <name> <score>   submit a score
  name <text>          type into the name field
  score <text>         type into the score field
  submit               submit the name and score fields
  refresh              re-read the leaderboard from the store
  clear                remove every score
  list                 print the current leaderboard
  help                 show this message
  quit                 exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Add { name: String, score: i64 },
    SetName(String),
    SetScore(String),
    Submit,
    Refresh,
    Clear,
    List,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "add" => parse_add(rest)?,
            "name" => Self::SetName(rest.to_string()),
            "score" => Self::SetScore(rest.to_string()),
            "submit" => Self::Submit,
            "refresh" => Self::Refresh,
            "clear" => Self::Clear,
            "list" => Self::List,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(fmt!("unknown command '{other}', try 'help'")),
        };
        Ok(Some(command))
    }
}

/// The score is the last word, so names may contain spaces.
fn parse_add(rest: &str) -> Result<ConsoleCommand, String> {
    let Some((name, score)) = rest.rsplit_once(char::is_whitespace) else {
        return Err("usage: add <name> <score>".to_string());
    };
    let score = score
        .parse::<i64>()
        .map_err(|_| fmt!("'{score}' is not a whole number"))?;

    Ok(ConsoleCommand::Add {
        name: name.trim().to_string(),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_with_spaced_name() {
        assert_eq!(
            ConsoleCommand::parse("add Ada Lovelace 1815").unwrap(),
            Some(ConsoleCommand::Add {
                name: "Ada Lovelace".to_string(),
                score: 1815
            })
        );
    }

    #[test]
    fn add_passes_negative_scores_through_for_validation() {
        assert_eq!(
            ConsoleCommand::parse("add X -1").unwrap(),
            Some(ConsoleCommand::Add {
                name: "X".to_string(),
                score: -1
            })
        );
    }

    #[test]
    fn add_needs_name_and_numeric_score() {
        assert!(ConsoleCommand::parse("add 10").is_err());
        assert!(ConsoleCommand::parse("add Bob ten").is_err());
    }

    #[test]
    fn field_commands_keep_raw_text() {
        assert_eq!(
            ConsoleCommand::parse("score  12a ").unwrap(),
            Some(ConsoleCommand::SetScore("12a".to_string()))
        );
        assert_eq!(
            ConsoleCommand::parse("name").unwrap(),
            Some(ConsoleCommand::SetName(String::new()))
        );
    }

    #[test]
    fn simple_verbs_and_blank_lines() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
        assert_eq!(ConsoleCommand::parse("CLEAR").unwrap(), Some(ConsoleCommand::Clear));
        assert_eq!(ConsoleCommand::parse("exit").unwrap(), Some(ConsoleCommand::Quit));
        assert!(ConsoleCommand::parse("dance").is_err());
    }
}
