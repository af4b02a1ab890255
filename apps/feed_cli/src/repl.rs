//! Interactive command parsing.

pub const HELP: &str = "\
commands:
  feed                 show the feed
  c <n> <text>         comment on post number <n>
  s <n>                send the draft kept on post number <n>
  help                 show this help
  quit                 exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    Feed,
    /// `index` is 1-based, as printed by the feed view.
    Comment { index: usize, text: String },
    SendDraft { index: usize },
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return Ok(Command::Empty);
    }

    let (verb, rest) = match trimmed.split_once(' ') {
        Some((verb, rest)) => (verb, rest),
        None => (trimmed, ""),
    };

    match verb {
        "help" | "?" => Ok(Command::Help),
        "feed" | "ls" => Ok(Command::Feed),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        "c" | "comment" => {
            let rest = rest.trim_start();
            let (index, text) = rest.split_once(' ').unwrap_or((rest, ""));
            Ok(Command::Comment {
                index: parse_index(index)?,
                text: text.to_string(),
            })
        }
        "s" | "send" => Ok(Command::SendDraft {
            index: parse_index(rest.trim())?,
        }),
        other => Err(format!("unknown command `{other}`; type `help`")),
    }
}

fn parse_index(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(index) if index > 0 => Ok(index),
        _ => Err(format!("expected a post number, got `{raw}`")),
    }
}
