use synthra_core::{Language, TabId, Tier};
use thiserror::Error;

/// One line of driver input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Navigate {
        tab_id: TabId,
        url: String,
        title: Option<String>,
    },
    Close {
        tab_id: TabId,
    },
    Summarize {
        tab_id: TabId,
        language: Option<Language>,
        tier: Option<Tier>,
        refresh: bool,
    },
    Status,
    History,
    Forget {
        content_id: String,
    },
    SetLanguage(Language),
    SetAutoSummarize(bool),
    SetTier(Tier),
    Init,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command {0:?}; try `help`")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid tab id {0:?}")]
    InvalidTab(String),
    #[error("unexpected argument {0:?}")]
    UnexpectedArgument(String),
}

pub const HELP: &str = "\
nav <tab> <url> [title]      report a navigation
close <tab>                  report a closed tab
summarize <tab> [lang] [tier] [--refresh]
status                       engine state, queue and settings
history                      list stored summaries
forget <content_id>          remove a stored summary
lang en|ko|ja|zh             set the summary language
auto on|off                  toggle auto-summarize
tier free|premium            set the tier
init                         request engine initialization
quit";

/// Parses a line; blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let command = match name {
        "nav" => {
            let usage = "nav <tab> <url> [title]";
            let tab_id = parse_tab(words.next(), usage)?;
            let url = words.next().ok_or(ParseError::Usage(usage))?.to_string();
            let title = words.by_ref().collect::<Vec<_>>().join(" ");
            Command::Navigate {
                tab_id,
                url,
                title: (!title.is_empty()).then_some(title),
            }
        }
        "close" => Command::Close {
            tab_id: parse_tab(words.next(), "close <tab>")?,
        },
        "summarize" => {
            let tab_id = parse_tab(words.next(), "summarize <tab> [lang] [tier] [--refresh]")?;
            let (mut language, mut tier, mut refresh) = (None, None, false);
            for word in words.by_ref() {
                if word == "--refresh" {
                    refresh = true;
                } else if let Ok(parsed) = word.parse::<Language>() {
                    language = Some(parsed);
                } else if let Ok(parsed) = word.parse::<Tier>() {
                    tier = Some(parsed);
                } else {
                    return Err(ParseError::UnexpectedArgument(word.to_string()));
                }
            }
            Command::Summarize {
                tab_id,
                language,
                tier,
                refresh,
            }
        }
        "status" => Command::Status,
        "history" => Command::History,
        "forget" => Command::Forget {
            content_id: words
                .next()
                .ok_or(ParseError::Usage("forget <content_id>"))?
                .to_string(),
        },
        "lang" => Command::SetLanguage(
            words
                .next()
                .and_then(|code| code.parse().ok())
                .ok_or(ParseError::Usage("lang en|ko|ja|zh"))?,
        ),
        "auto" => match words.next() {
            Some("on") => Command::SetAutoSummarize(true),
            Some("off") => Command::SetAutoSummarize(false),
            _ => return Err(ParseError::Usage("auto on|off")),
        },
        "tier" => Command::SetTier(
            words
                .next()
                .and_then(|tier| tier.parse().ok())
                .ok_or(ParseError::Usage("tier free|premium"))?,
        ),
        "init" => Command::Init,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };

    match words.next() {
        Some(extra) => Err(ParseError::UnexpectedArgument(extra.to_string())),
        None => Ok(Some(command)),
    }
}

fn parse_tab(word: Option<&str>, usage: &'static str) -> Result<TabId, ParseError> {
    let word = word.ok_or(ParseError::Usage(usage))?;
    word.parse()
        .map_err(|_| ParseError::InvalidTab(word.to_string()))
}
