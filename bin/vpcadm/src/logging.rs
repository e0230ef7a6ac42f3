// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Process-wide log setup.
//!
//! Logs go to stderr so that stdout carries only command output.
//! `RUST_LOG`, when set, refines the configured level per module.

use clap::ValueEnum;
use serde::Deserialize;
use serde::Serialize;
use slog::Drain;
use slog::FilterLevel;
use slog::Logger;
use slog::o;
use std::io::IsTerminal;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    #[value(alias = "warn")]
    Warning,
    Error,
    Critical,
}

impl From<LogLevel> for FilterLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => FilterLevel::Trace,
            LogLevel::Debug => FilterLevel::Debug,
            LogLevel::Info => FilterLevel::Info,
            LogLevel::Warning => FilterLevel::Warning,
            LogLevel::Error => FilterLevel::Error,
            LogLevel::Critical => FilterLevel::Critical,
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Full records on a terminal, compact ones otherwise.
    #[default]
    Auto,
    Full,
    Compact,
}

impl LogFormat {
    fn resolve(self, is_terminal: bool) -> Self {
        match self {
            Self::Auto if is_terminal => Self::Full,
            Self::Auto => Self::Compact,
            other => other,
        }
    }
}

/// Build the root logger.
///
/// The returned guard flushes the async drain when dropped; hold it
/// until the process is done logging.
pub fn init(
    level: LogLevel,
    format: LogFormat,
) -> (Logger, slog_async::AsyncGuard) {
    let decorator = slog_term::TermDecorator::new().stderr().build();

    let drain: Box<dyn Drain<Ok = (), Err = slog::Never> + Send> =
        match format.resolve(std::io::stderr().is_terminal()) {
            LogFormat::Compact => {
                let format = slog_term::CompactFormat::new(decorator).build();
                Box::new(format.fuse())
            }
            _ => Box::new(slog_term::FullFormat::new(decorator).build().fuse()),
        };

    let mut builder =
        slog_envlogger::LogBuilder::new(drain).filter(None, level.into());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder = builder.parse(&filters);
    }
    let drain = builder.build().fuse();

    let (drain, guard) = slog_async::Async::new(drain).build_with_guard();
    let log = Logger::root(
        drain.fuse(),
        o!("component" => "vpcadm", "version" => env!("CARGO_PKG_VERSION")),
    );

    (log, guard)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn auto_format_follows_terminal() {
        assert_eq!(LogFormat::Auto.resolve(true), LogFormat::Full);
        assert_eq!(LogFormat::Auto.resolve(false), LogFormat::Compact);
        assert_eq!(LogFormat::Full.resolve(false), LogFormat::Full);
    }

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(FilterLevel::from(LogLevel::Warning), FilterLevel::Warning);
        assert_eq!(FilterLevel::from(LogLevel::default()), FilterLevel::Info);
    }
}
