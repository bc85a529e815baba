/// A parsed inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Art { prompt: String },
    Research { query: String },
    Summarize { hours: u32 },
    /// Admin: grant users by username or numeric id
    Whitelist { entries: Vec<String> },
    /// Admin: grant the current group chat
    WhitelistGroup,
    Help,
    /// Plain text or a command we do not handle; logged only
    Unrecognized,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Art { .. } => "art",
            Command::Research { .. } => "research",
            Command::Summarize { .. } => "summarize",
            Command::Whitelist { .. } => "whitelist",
            Command::WhitelistGroup => "whitelist_group",
            Command::Help => "help",
            Command::Unrecognized => "none",
        }
    }
}

/// A recognized command with a bad argument. The message is the hint
/// shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("Please provide a prompt after /art. Example: /art sunset over mountains")]
    MissingPrompt,

    #[error("Please provide a query after /research. Example: /research latest Rust release")]
    MissingQuery,

    #[error("Please provide a valid number of hours (e.g., /summarize 4)")]
    InvalidHours(String),

    #[error("Usage: /whitelist username1 username2 ...")]
    MissingUsers,
}

/// Longest window `/summarize` accepts: one year
pub const MAX_SUMMARY_HOURS: u32 = 24 * 365;

pub const HELP_TEXT: &str = "Commands:\n\
    /art <prompt> - generate an image\n\
    /research <query> - answer a question with web sources\n\
    /summarize [hours] - summarize this chat (default 3 hours)\n\
    /whitelist <user>... - allow users (admins only)\n\
    /whitelist_group - allow everyone in this group (admins only)";

/// Parse message text into a command.
///
/// A command is `/keyword`, optionally addressed as `/keyword@botname`,
/// followed by whitespace and the argument.
pub fn parse(text: &str, default_hours: u32) -> Result<Command, UsageError> {
    let Some(rest) = text.trim().strip_prefix('/') else {
        return Ok(Command::Unrecognized);
    };

    let (head, arg) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    };
    let keyword = head.split_once('@').map_or(head, |(keyword, _)| keyword);

    match keyword {
        "art" => {
            if arg.is_empty() {
                Err(UsageError::MissingPrompt)
            } else {
                Ok(Command::Art {
                    prompt: arg.to_string(),
                })
            }
        }
        "research" | "px" => {
            if arg.is_empty() {
                Err(UsageError::MissingQuery)
            } else {
                Ok(Command::Research {
                    query: arg.to_string(),
                })
            }
        }
        "summarize" => {
            if arg.is_empty() {
                return Ok(Command::Summarize {
                    hours: default_hours,
                });
            }
            match arg.parse::<u32>() {
                Ok(hours) if (1..=MAX_SUMMARY_HOURS).contains(&hours) => {
                    Ok(Command::Summarize { hours })
                }
                _ => Err(UsageError::InvalidHours(arg.to_string())),
            }
        }
        "whitelist" => {
            let entries: Vec<String> = arg.split_whitespace().map(str::to_string).collect();
            if entries.is_empty() {
                Err(UsageError::MissingUsers)
            } else {
                Ok(Command::Whitelist { entries })
            }
        }
        "whitelist_group" => Ok(Command::WhitelistGroup),
        "start" | "help" => Ok(Command::Help),
        _ => Ok(Command::Unrecognized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> Result<Command, UsageError> {
        parse(text, 3)
    }

    #[test]
    fn test_art_takes_trimmed_prompt() {
        assert_eq!(
            p("/art   a red fox in snow  "),
            Ok(Command::Art {
                prompt: "a red fox in snow".to_string()
            })
        );
    }

    #[test]
    fn test_art_without_prompt_is_usage_error() {
        assert_eq!(p("/art"), Err(UsageError::MissingPrompt));
        assert_eq!(p("/art    "), Err(UsageError::MissingPrompt));
    }

    #[test]
    fn test_research_and_alias() {
        let expected = Ok(Command::Research {
            query: "who won".to_string(),
        });
        assert_eq!(p("/research who won"), expected);
        assert_eq!(p("/px who won"), expected);
        assert_eq!(p("/research"), Err(UsageError::MissingQuery));
    }

    #[test]
    fn test_summarize_hours() {
        assert_eq!(p("/summarize"), Ok(Command::Summarize { hours: 3 }));
        assert_eq!(parse("/summarize", 6), Ok(Command::Summarize { hours: 6 }));
        assert_eq!(p("/summarize 12"), Ok(Command::Summarize { hours: 12 }));
    }

    #[test]
    fn test_summarize_rejects_bad_hours() {
        for arg in ["abc", "0", "-2", "1.5", "4 extra"] {
            assert_eq!(
                p(&format!("/summarize {arg}")),
                Err(UsageError::InvalidHours(arg.to_string())),
                "argument {arg:?}"
            );
        }
    }

    #[test]
    fn test_summarize_hours_are_capped_at_a_year() {
        assert_eq!(
            p("/summarize 8760"),
            Ok(Command::Summarize {
                hours: MAX_SUMMARY_HOURS
            })
        );
        for arg in ["8761", "3000000000", "99999999999"] {
            assert_eq!(
                p(&format!("/summarize {arg}")),
                Err(UsageError::InvalidHours(arg.to_string())),
                "argument {arg:?}"
            );
        }
    }

    #[test]
    fn test_bot_mention_suffix_is_ignored() {
        assert_eq!(
            p("/art@relay_bot sunset"),
            Ok(Command::Art {
                prompt: "sunset".to_string()
            })
        );
        assert_eq!(p("/summarize@relay_bot"), Ok(Command::Summarize { hours: 3 }));
    }

    #[test]
    fn test_keyword_must_end_at_boundary() {
        assert_eq!(p("/artsy stuff"), Ok(Command::Unrecognized));
        assert_eq!(p("/summarizer"), Ok(Command::Unrecognized));
    }

    #[test]
    fn test_plain_text_is_unrecognized() {
        assert_eq!(p("art a red fox"), Ok(Command::Unrecognized));
        assert_eq!(p(""), Ok(Command::Unrecognized));
        assert_eq!(p("/"), Ok(Command::Unrecognized));
    }

    #[test]
    fn test_whitelist_commands() {
        assert_eq!(
            p("/whitelist @bob carol 123"),
            Ok(Command::Whitelist {
                entries: vec!["@bob".into(), "carol".into(), "123".into()]
            })
        );
        assert_eq!(p("/whitelist"), Err(UsageError::MissingUsers));
        assert_eq!(p("/whitelist_group"), Ok(Command::WhitelistGroup));
        assert_eq!(p("/start"), Ok(Command::Help));
    }
}
