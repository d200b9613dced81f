//! Line-oriented operator console.
//!
//! Reads commands (see [`command`]) and drives an [`Engine`]. Output goes to
//! any `Write`, so the console runs the same against a terminal or a test
//! buffer; colors are only used when `styled` is on.

pub mod command;
pub mod decoder;

use std::{
    io::{self, BufRead, Write},
    sync::Arc,
    thread,
    time::Duration,
};

use crossterm::style::Stylize;

pub use self::{
    command::{Command, CommandError},
    decoder::decode,
};
use crate::{
    config::Config,
    engine::{Engine, GeneratorFilter},
    error::EngineError,
    params::{short_key, ParamRecord},
};

pub const PROMPT: &str = "voicegrid: ";

/// Whether the console should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console {
    engine: Arc<Engine>,
    config: Config,
    tags: Vec<String>,
    styled: bool,
}

impl Console {
    pub fn new(engine: Arc<Engine>, config: Config) -> Self {
        Self {
            engine,
            config,
            tags: Vec::new(),
            styled: false,
        }
    }

    /// Color parameter summaries
    pub fn styled(mut self, styled: bool) -> Self {
        self.styled = styled;
        self
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Tags collected with `c`
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Read commands until `q` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> io::Result<()> {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        for line in input.lines() {
            if self.dispatch(&line?, &mut out)? == Flow::Quit {
                return Ok(());
            }
            write!(out, "{PROMPT}")?;
            out.flush()?;
        }

        writeln!(out)?;
        Ok(())
    }

    /// Execute one command line.
    pub fn dispatch<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<Flow> {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                writeln!(out, "{err}")?;
                return Ok(Flow::Continue);
            }
        };

        match command {
            Command::Empty => {}
            Command::Play(commands) => self.play(&commands, out)?,
            Command::Stop(ids) => {
                for id in ids {
                    self.engine.stop(id);
                }
            }
            Command::StopAll(filter) => self.engine.stop_by_filter(&filter),
            Command::Volume { id, percent } => {
                if let Some(id) = id {
                    self.engine.set_volume(id, percent, &GeneratorFilter::Any);
                }
            }
            Command::VolumeAll { percent, filter } => {
                self.engine.set_volume_by_filter(percent, &filter)
            }
            Command::List => self.list(out)?,
            Command::Preset(name) => self.preset(&name, out)?,
            Command::Tag(tag) => {
                self.tags.push(tag);
                writeln!(out, "{:?}", self.tags)?;
            }
            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    /// Allocate a voice for each comma separated generator command
    fn play<W: Write>(&self, commands: &str, out: &mut W) -> io::Result<()> {
        for command in commands.split(',') {
            let Some(request) = decode(command, &self.config) else {
                writeln!(out, "invalid generator")?;
                continue;
            };

            match self.engine.allocate_voice(request) {
                Ok(id) => {
                    if let Some(params) = self.engine.registry().get(id) {
                        writeln!(out, "{id} {}", format_params(&params, self.styled))?;
                    }
                }
                Err(EngineError::InvalidGenerator(_)) => writeln!(out, "invalid generator")?,
                Err(err) => {
                    log::error!("allocation failed: {err}");
                    writeln!(out, "{err}")?;
                }
            }
        }
        Ok(())
    }

    fn list<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for summary in self.engine.list_active() {
            writeln!(
                out,
                "{} {}",
                summary.id,
                format_params(&summary.params, self.styled)
            )?;
        }
        Ok(())
    }

    /// Replay a preset's generator commands, paced. Unknown presets do nothing.
    fn preset<W: Write>(&self, name: &str, out: &mut W) -> io::Result<()> {
        let Some(commands) = self.config.preset(name) else {
            log::debug!("no preset named `{name}`");
            return Ok(());
        };
        let pacing = Duration::from_millis(self.config.preset_pacing_ms);

        for command in commands.iter().filter(|c| c.len() > 2) {
            self.play(command, out)?;
            thread::sleep(pacing);
        }
        Ok(())
    }
}

/// One-line parameter summary with three-letter keys.
///
/// Styled output colors keys cyan and values yellow.
pub fn format_params(params: &ParamRecord, styled: bool) -> String {
    if !styled {
        return params.to_string();
    }

    params
        .entries()
        .into_iter()
        .map(|(key, value)| {
            let label = format!("{}:", short_key(&key));
            format!("{} {}", label.as_str().cyan(), value.as_str().yellow())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GeneratorSpec;

    #[test]
    fn plain_format_matches_display() {
        let record = ParamRecord::new(GeneratorSpec::new("click"), 120.0);
        assert_eq!(
            format_params(&record, false),
            "gen: click bpm: 120 loo: true tar: 1"
        );
    }

    #[test]
    fn styled_format_keeps_the_text() {
        let record = ParamRecord::new(GeneratorSpec::new("click"), 120.0);
        let styled = format_params(&record, true);
        assert!(styled.contains("gen:"));
        assert!(styled.contains("click"));
        assert!(styled.contains("tar:"));
    }
}
