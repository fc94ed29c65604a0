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

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::LevelFilter;
use structopt::StructOpt;

use crate::support::config::Config;
use crate::support::error::Error;
use crate::support::logging;
use crate::support::sysexits::*;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
struct Command {
    /// Read configuration from this TOML file. Without it, the built-in
    /// defaults are used, including the default header policy.
    #[structopt(long, short, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Log debugging information to standard error. Ignored if the
    /// configuration names a log4rs configuration file.
    #[structopt(long, short)]
    verbose: bool,

    #[structopt(subcommand)]
    subcommand: Subcommand,
}

#[derive(StructOpt)]
enum Subcommand {
    Protect(ProtectSubcommand),
    Unwrap(UnwrapSubcommand),
}

/// Protect the headers of an outgoing message.
///
/// The message is read in full, its protected headers are copied inside, and
/// the result is written to standard output as a PGP/MIME message. By
/// default, the message is signed and encrypted to every address in To, Cc
/// and Bcc, and the outer copies of hidden headers (by default, the Subject)
/// are replaced with placeholders.
///
/// Bcc is never written to the output.
#[derive(StructOpt)]
pub(super) struct ProtectSubcommand {
    /// Only sign the message. No headers are hidden.
    #[structopt(long)]
    pub(super) sign_only: bool,

    /// The message to protect. "-" reads from stdin.
    #[structopt(parse(from_os_str), default_value = "-")]
    pub(super) input: PathBuf,
}

/// Decrypt and verify a received message and restore its protected headers.
///
/// The unwrapped message is written to standard output.
#[derive(StructOpt)]
pub(super) struct UnwrapSubcommand {
    /// Describe the signatures, decryption keys and replaced headers on
    /// standard error.
    #[structopt(long)]
    pub(super) report: bool,

    /// The message to unwrap. "-" reads from stdin.
    #[structopt(parse(from_os_str), default_value = "-")]
    pub(super) input: PathBuf,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    let config = match cmd.config {
        None => Config::default(),
        Some(ref path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error in config file at '{}': {}", path.display(), e);
                EX_CONFIG.exit()
            },
        },
    };

    let log_result = match config.log_config {
        Some(ref path) => logging::init_file(path),
        None => logging::init_stderr(if cmd.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        }),
    };
    if let Err(e) = log_result {
        eprintln!("Failed to initialise logging: {}", e);
        EX_CONFIG.exit();
    }

    match cmd.subcommand {
        Subcommand::Protect(cmd) => super::protect::main(cmd, config),
        Subcommand::Unwrap(cmd) => super::unwrap::main(cmd, config),
    }
}

/// Reads the whole of `path`, or stdin if it is "-".
pub(super) fn read_input(path: &Path) -> Vec<u8> {
    let result = if Path::new("-") == path {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data).map(|_| data)
    } else {
        fs::read(path)
    };

    match result {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error reading '{}': {}", path.display(), e);
            EX_NOINPUT.exit()
        },
    }
}

pub(super) fn or_die<T>(result: Result<T, Error>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}", e);
            Sysexit::from(&e).exit()
        },
    }
}
