//! Console logging
//!
//! The library only emits records through the `log` macros. Binaries call
//! [`init`] once to print them on stdout with a timestamp and a colored
//! level tag.

use log::{LevelFilter, Record};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::runtime::ConfigErrors;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::encode::{Encode, Write};
use log4rs::{Config, Handle};
use thiserror::Error;

// ISO 8601 timestamp, color coded level, target
const DEFAULT_LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

/// Logger setup failures
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The appender configuration was rejected
    #[error("invalid logging configuration")]
    Config(#[from] ConfigErrors),
    /// A global logger is already installed
    #[error("a logger is already installed")]
    AlreadyInstalled(#[from] log::SetLoggerError),
}

/// Clears the current terminal line before each record so log lines do not
/// interleave with a progress bar.
#[derive(Debug)]
struct ClearLineEncoder {
    inner: Box<dyn Encode>,
}

impl Encode for ClearLineEncoder {
    fn encode(&self, w: &mut dyn Write, record: &Record) -> anyhow::Result<()> {
        w.write_all(b"\x1B[2K\r")?;
        self.inner.encode(w, record)
    }
}

fn build_config(level: LevelFilter) -> Result<Config, ConfigErrors> {
    let encoder = ClearLineEncoder {
        inner: Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)),
    };
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(encoder))
        .build();
    Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
}

/// Install the global console logger at `level`.
///
/// Fails if another logger has already been installed in this process.
pub fn init(level: LevelFilter) -> Result<Handle, LoggingError> {
    let config = build_config(level)?;
    Ok(log4rs::init_config(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builds_for_every_level() {
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Info,
            LevelFilter::Trace,
        ] {
            let config = build_config(level).unwrap();
            assert_eq!(config.root().level(), level);
            assert_eq!(config.appenders().len(), 1);
        }
    }
}
