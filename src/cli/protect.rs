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

use std::io;

use super::main::{or_die, read_input, ProtectSubcommand};
use crate::crypt::Gpg;
use crate::memory_hole::protect;
use crate::mime::part::Part;
use crate::support::config::Config;

pub(super) fn main(cmd: ProtectSubcommand, config: Config) {
    let message = or_die(Part::parse(&read_input(&cmd.input)));
    let policy = config.header_policy();
    let mut gpg = Gpg::new(config.gpg);

    let protected =
        or_die(protect(&message, !cmd.sign_only, &policy, &mut gpg));
    or_die(protected.write_to(io::stdout().lock()).map_err(Into::into));
}
