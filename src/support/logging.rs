//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Memoryhole.
//
// Memoryhole is free software: you can redistribute it and/or modify it under
// the terms of the  GNU General Public License as published  by the Free
// Software Foundation, either version 3 of  the License, or (at your option)
// any later version.
//
// Memoryhole is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY;  without even the  implied warranty of  MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Memoryhole. If not, see <http://www.gnu.org/licenses/>.

//! Logging setup, on top of `log4rs`.

use std::error::Error as StdError;
use std::path::Path;

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Deserializers, Root};
use log4rs::encode::pattern::PatternEncoder;

type InitError = Box<dyn StdError + Send + Sync>;

const STDERR_PATTERN: &str = "{d(%H:%M:%S%.3f)} [{l}][{t}] {m}{n}";

/// Logs everything at `level` or above to standard error.
pub fn init_stderr(level: LevelFilter) -> Result<(), InitError> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(STDERR_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configures logging from a `log4rs` configuration file.
pub fn init_file(path: &Path) -> Result<(), InitError> {
    log4rs::init_file(path, Deserializers::default())?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(init_file(Path::new("/nonexistent/log4rs.toml")).is_err());
    }
}
