//! Line commands read from stdin by the interactive console.

use shared::protocol::CommitMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Edit,
    /// `id` is as typed; it is matched against the offered items' ids.
    Toggle { id: String },
    Next,
    Back,
    Show,
    Refresh,
    Revert,
    Commit { metadata: CommitMetadata },
    Cancel,
    Dismiss,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Toggle { .. } => "toggle",
            Self::Next => "next",
            Self::Back => "back",
            Self::Show => "show",
            Self::Refresh => "refresh",
            Self::Revert => "revert",
            Self::Commit { .. } => "commit",
            Self::Cancel => "cancel",
            Self::Dismiss => "dismiss",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

pub const HELP: &str = "\
commands:
  edit                 start an edit session
  toggle <id>          add or remove an assignment (alias: t)
  next                 save this wizard step and open the next one (alias: n)
  back                 return to the previous wizard step (alias: b)
  show                 print the pending changes and their impact
  refresh              re-run the impact simulation now
  revert               drop every pending change
  commit [name]        apply the pending changes
  cancel               leave edit mode
  dismiss              clear the current notice
  help
  quit";

pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "edit" => ConsoleCommand::Edit,
        "toggle" | "t" => {
            if rest.is_empty() {
                return Err("toggle needs an assignment id".into());
            }
            ConsoleCommand::Toggle {
                id: rest.to_string(),
            }
        }
        "next" | "n" => ConsoleCommand::Next,
        "back" | "b" => ConsoleCommand::Back,
        "show" | "s" => ConsoleCommand::Show,
        "refresh" => ConsoleCommand::Refresh,
        "revert" => ConsoleCommand::Revert,
        "commit" => ConsoleCommand::Commit {
            metadata: CommitMetadata {
                name: Some(rest.to_string()).filter(|name| !name.is_empty()),
                description: None,
            },
        },
        "cancel" => ConsoleCommand::Cancel,
        "dismiss" => ConsoleCommand::Dismiss,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };

    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_keeps_the_id_as_typed() {
        assert_eq!(
            parse_command("toggle 42"),
            Ok(Some(ConsoleCommand::Toggle { id: "42".into() }))
        );
        assert_eq!(
            parse_command("t  grp-ops "),
            Ok(Some(ConsoleCommand::Toggle {
                id: "grp-ops".into()
            }))
        );
    }

    #[test]
    fn commit_name_is_optional() {
        assert_eq!(
            parse_command("commit"),
            Ok(Some(ConsoleCommand::Commit {
                metadata: CommitMetadata::default()
            }))
        );
        let Ok(Some(ConsoleCommand::Commit { metadata })) = parse_command("commit Q3 cleanup")
        else {
            panic!("expected a commit command");
        };
        assert_eq!(metadata.name.as_deref(), Some("Q3 cleanup"));
    }

    #[test]
    fn blank_lines_are_skipped_and_unknown_words_rejected() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command("N"), Ok(Some(ConsoleCommand::Next)));
        assert!(parse_command("toggle").is_err());
        assert!(parse_command("frobnicate").is_err());
    }
}
