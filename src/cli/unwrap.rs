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

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io;

use super::main::{or_die, read_input, UnwrapSubcommand};
use crate::crypt::Gpg;
use crate::memory_hole::{
    unwrap_with_config, Fingerprint, HeaderReplacement, MemoryHoleMessage,
};
use crate::mime::part::Part;
use crate::support::config::Config;

pub(super) fn main(cmd: UnwrapSubcommand, config: Config) {
    let message = or_die(Part::parse(&read_input(&cmd.input)));
    let mut gpg = Gpg::new(config.gpg);

    let unwrapped =
        or_die(unwrap_with_config(&message, &mut gpg, &config.unwrap));
    if cmd.report {
        eprint!("{}", report(&unwrapped));
    }

    or_die(
        unwrapped
            .message()
            .write_to(io::stdout().lock())
            .map_err(Into::into),
    );
}

fn join(fingerprints: &BTreeSet<Fingerprint>) -> String {
    fingerprints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn report(unwrapped: &MemoryHoleMessage) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Signed by: {}", join(unwrapped.signed()));
    let _ = writeln!(out, "Encrypted to: {}", join(unwrapped.encrypted()));
    if 0 != unwrapped.invalid_signatures() {
        let _ = writeln!(
            out,
            "Invalid signatures: {}",
            unwrapped.invalid_signatures()
        );
    }

    for (name, replacement) in unwrapped.header_replacements() {
        let _ = match *replacement {
            None => writeln!(out, "{}: protected", name),
            Some(HeaderReplacement {
                force_display,
                ref orig_value,
            }) => writeln!(
                out,
                "{}: protected, replacing {}{}",
                name,
                orig_value
                    .as_ref()
                    .map_or_else(|| "nothing".to_owned(), |v| format!("{:?}", v)),
                if force_display { " (force display)" } else { "" },
            ),
        };
    }

    out
}
