//! Console command grammar.
//!
//! ```text
//! <generator> key:value ... [, <generator> ...]   allocate voices
//! s <id> [<id> ...]                               stop voices
//! ss [<generator> ...|all]                        stop by generator
//! v <id> <percent>                                set one voice's volume
//! vv <percent> [<generator>|any]                  set volume by generator
//! i                                               list voices
//! p <preset>                                      replay a preset
//! c <tag>                                         add a tag
//! q                                               quit
//! ```

use std::str::FromStr;

use thiserror::Error;

use crate::engine::{GeneratorFilter, VoiceId};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Blank line
    Empty,
    /// Comma separated generator commands, passed to the decoder
    Play(String),
    /// Ids that did not parse are dropped
    Stop(Vec<VoiceId>),
    StopAll(GeneratorFilter),
    /// `id` is `None` when the id text was not a valid id
    Volume { id: Option<VoiceId>, percent: f64 },
    VolumeAll { percent: f64, filter: GeneratorFilter },
    List,
    Preset(String),
    Tag(String),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("`{command}` needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("`{0}` is not a volume percentage")]
    BadPercent(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(Command::Empty);
        };
        let rest: Vec<&str> = words.collect();

        let command = match head {
            "s" => Command::Stop(rest.iter().filter_map(|w| w.parse().ok()).collect()),
            "ss" => Command::StopAll(GeneratorFilter::from_words(&rest)),
            "v" => {
                let id = rest.first().ok_or(CommandError::MissingArgument {
                    command: "v",
                    argument: "a voice id",
                })?;
                let percent = rest.get(1).ok_or(CommandError::MissingArgument {
                    command: "v",
                    argument: "a volume percentage",
                })?;
                Command::Volume {
                    id: id.parse().ok(),
                    percent: parse_percent(percent)?,
                }
            }
            "vv" => {
                let percent = rest.first().ok_or(CommandError::MissingArgument {
                    command: "vv",
                    argument: "a volume percentage",
                })?;
                Command::VolumeAll {
                    percent: parse_percent(percent)?,
                    filter: GeneratorFilter::from_words(&rest[1..]),
                }
            }
            "i" => Command::List,
            "p" => Command::Preset(required(&rest, "p", "a preset name")?),
            "c" => Command::Tag(required(&rest, "c", "a tag")?),
            "q" | "quit" | "exit" => Command::Quit,
            _ => Command::Play(line.to_string()),
        };

        Ok(command)
    }
}

fn required(
    rest: &[&str],
    command: &'static str,
    argument: &'static str,
) -> Result<String, CommandError> {
    rest.first()
        .map(|word| word.to_string())
        .ok_or(CommandError::MissingArgument { command, argument })
}

fn parse_percent(word: &str) -> Result<f64, CommandError> {
    word.parse::<f64>()
        .ok()
        .filter(|percent| percent.is_finite())
        .ok_or_else(|| CommandError::BadPercent(word.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, CommandError> {
        line.parse()
    }

    #[test]
    fn blank_lines_are_empty() {
        assert_eq!(parse("   "), Ok(Command::Empty));
    }

    #[test]
    fn stop_keeps_only_valid_ids() {
        assert_eq!(
            parse("s 1 x 3 0"),
            Ok(Command::Stop(vec![VoiceId(1), VoiceId(3)]))
        );
        assert_eq!(parse("s"), Ok(Command::Stop(vec![])));
    }

    #[test]
    fn stop_all_filters() {
        assert_eq!(parse("ss"), Ok(Command::StopAll(GeneratorFilter::Any)));
        assert_eq!(parse("ss all"), Ok(Command::StopAll(GeneratorFilter::Any)));
        assert_eq!(
            parse("ss click"),
            Ok(Command::StopAll(GeneratorFilter::named("click")))
        );
    }

    #[test]
    fn volume_commands() {
        assert_eq!(
            parse("v 2 50"),
            Ok(Command::Volume {
                id: Some(VoiceId(2)),
                percent: 50.0
            })
        );
        assert_eq!(
            parse("v two 50"),
            Ok(Command::Volume {
                id: None,
                percent: 50.0
            })
        );
        assert_eq!(
            parse("vv 25 pulse"),
            Ok(Command::VolumeAll {
                percent: 25.0,
                filter: GeneratorFilter::named("pulse")
            })
        );
        assert_eq!(
            parse("vv 25"),
            Ok(Command::VolumeAll {
                percent: 25.0,
                filter: GeneratorFilter::Any
            })
        );
    }

    #[test]
    fn malformed_volume_commands_are_errors() {
        assert!(matches!(
            parse("v 2"),
            Err(CommandError::MissingArgument { command: "v", .. })
        ));
        assert_eq!(parse("v 2 loud"), Err(CommandError::BadPercent("loud".into())));
        assert!(matches!(parse("vv"), Err(CommandError::MissingArgument { .. })));
    }

    #[test]
    fn anything_else_is_a_play_command() {
        assert_eq!(
            parse(" click width:30, pulse "),
            Ok(Command::Play("click width:30, pulse".into()))
        );
        assert_eq!(parse("p intro"), Ok(Command::Preset("intro".into())));
        assert_eq!(parse("c verse"), Ok(Command::Tag("verse".into())));
        assert_eq!(parse("q"), Ok(Command::Quit));
        assert_eq!(parse("i"), Ok(Command::List));
    }
}
