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

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Trait for generating multipart boundaries.
///
/// In practical use, this will always be `RandomSeparatorGen`, but the tests
/// provide their own deterministic implementation.
pub trait SeparatorGen {
    /// Generates a new, unique multipart boundary. The boundary must be safe
    /// to splice into a quoted-string without escaping, and must not exceed
    /// 70 characters in length.
    fn gen(&mut self) -> String;
}

/// Boundary generator drawing from the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSeparatorGen;

impl SeparatorGen for RandomSeparatorGen {
    fn gen(&mut self) -> String {
        let suffix = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect::<String>();
        format!("=_memoryhole_{}", suffix)
    }
}

#[cfg(test)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DetSeparatorGen {
    counter: u32,
}

#[cfg(test)]
impl SeparatorGen for DetSeparatorGen {
    fn gen(&mut self) -> String {
        self.counter += 1;
        format!("=_memoryhole_{}", self.counter)
    }
}
