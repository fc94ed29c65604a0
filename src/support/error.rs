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

use std::fmt;
use std::io;

use thiserror::Error;

/// The OpenPGP operation that failed, for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Sign,
    Decrypt,
    Verify,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Operation::Encrypt => write!(f, "encryption"),
            Operation::Sign => write!(f, "signing"),
            Operation::Decrypt => write!(f, "decryption"),
            Operation::Verify => write!(f, "verification"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// The cryptographic MIME structure does not have the shape RFC 3156
    /// requires, or the header merge was attempted before a body was found.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    /// The OpenPGP collaborator reported failure.
    #[error("OpenPGP {operation} failed: {message}")]
    OpenPgp {
        operation: Operation,
        message: String,
    },
    /// A detached signature did not verify and the configuration asks for
    /// such messages to be rejected.
    #[error("Invalid signature on signed part")]
    InvalidSignature,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedMessage(message.into())
    }

    pub(crate) fn openpgp(
        operation: Operation,
        message: impl Into<String>,
    ) -> Self {
        Error::OpenPgp {
            operation,
            message: message.into(),
        }
    }
}
