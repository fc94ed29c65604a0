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

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The fingerprint of an OpenPGP key, as reported by the OpenPGP backend.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Fingerprint(s.to_owned())
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Fingerprint(s)
    }
}

/// Describes how well protected a piece of data is: which keys signed it and
/// which keys it was encrypted to.
///
/// Levels are ordered by their `score` alone, so two levels with different
/// keys but the same kinds of protection compare equal. Use
/// `same_provenance` to compare the actual keys.
///
/// Levels are only comparable with each other:
///
/// ```compile_fail
/// use memoryhole::memory_hole::ProtectionLevel;
///
/// let level = ProtectionLevel::default();
/// let _ = level > 2;
/// ```
#[derive(Clone, Debug, Default)]
pub struct ProtectionLevel {
    signed_by: BTreeSet<Fingerprint>,
    encrypted_by: BTreeSet<Fingerprint>,
}

impl ProtectionLevel {
    pub fn new(
        signed_by: BTreeSet<Fingerprint>,
        encrypted_by: BTreeSet<Fingerprint>,
    ) -> Self {
        ProtectionLevel {
            signed_by,
            encrypted_by,
        }
    }

    pub fn signed_by(&self) -> &BTreeSet<Fingerprint> {
        &self.signed_by
    }

    pub fn encrypted_by(&self) -> &BTreeSet<Fingerprint> {
        &self.encrypted_by
    }

    /// 3 if signed and encrypted, 2 if only signed, 1 if only encrypted, 0
    /// otherwise.
    pub fn score(&self) -> u8 {
        match (self.signed_by.is_empty(), self.encrypted_by.is_empty()) {
            (false, false) => 3,
            (false, true) => 2,
            (true, false) => 1,
            (true, true) => 0,
        }
    }

    /// Returns this level with `signer` added.
    pub fn with_signer(&self, signer: Fingerprint) -> Self {
        let mut level = self.clone();
        level.signed_by.insert(signer);
        level
    }

    /// Returns this level with `encryptor` added.
    pub fn with_encryptor(&self, encryptor: Fingerprint) -> Self {
        let mut level = self.clone();
        level.encrypted_by.insert(encryptor);
        level
    }

    /// Whether both levels have exactly the same signers and encryptors.
    pub fn same_provenance(&self, other: &Self) -> bool {
        self.signed_by == other.signed_by
            && self.encrypted_by == other.encrypted_by
    }

    /// Whether a part at this level should displace a body part at `current`.
    ///
    /// More encryption keys always win. With equally many, the candidate wins
    /// unless it has fewer signers, so that deeper parts displace shallower
    /// ones of the same standing.
    pub fn supersedes(&self, current: &Self) -> bool {
        if self.encrypted_by.len() != current.encrypted_by.len() {
            self.encrypted_by.len() > current.encrypted_by.len()
        } else {
            self.signed_by.len() >= current.signed_by.len()
        }
    }
}

impl PartialEq for ProtectionLevel {
    fn eq(&self, other: &Self) -> bool {
        self.score() == other.score()
    }
}

impl Eq for ProtectionLevel {}

impl PartialOrd for ProtectionLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProtectionLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score().cmp(&other.score())
    }
}
