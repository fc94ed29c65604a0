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

//! Constants from `sysexits.h`, and the mapping from `Error` onto them.

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }
}

impl From<&Error> for Sysexit {
    fn from(e: &Error) -> Self {
        match *e {
            Error::MalformedMessage(..) | Error::InvalidSignature => {
                EX_DATAERR
            },
            Error::OpenPgp { .. } => EX_SOFTWARE,
            Error::Io(..) => EX_IOERR,
            Error::Config(..) => EX_CONFIG,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::support::error::Operation;

    #[test]
    fn errors_map_to_exit_codes() {
        assert_eq!(EX_DATAERR, Sysexit::from(&Error::malformed("x")));
        assert_eq!(EX_DATAERR, Sysexit::from(&Error::InvalidSignature));
        assert_eq!(
            EX_SOFTWARE,
            Sysexit::from(&Error::openpgp(Operation::Decrypt, "no key"))
        );
        assert_eq!(
            EX_IOERR,
            Sysexit::from(&Error::Io(std::io::ErrorKind::BrokenPipe.into()))
        );
    }
}
