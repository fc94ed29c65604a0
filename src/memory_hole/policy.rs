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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a header is treated when a message is protected.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "disposition", rename_all = "kebab-case")]
pub enum HeaderDisposition {
    /// Copied into the protected part; the outer header is left alone.
    Protected,
    /// Copied into the protected part. On encrypted messages, the outer
    /// header is replaced by `replacement`, or removed if that is `None`.
    Replaced {
        /// Whether the real value must still be shown to the recipient, via
        /// a `text/rfc822-headers` part.
        #[serde(default)]
        force_display: bool,
        #[serde(default)]
        replacement: Option<String>,
    },
}

/// Maps header names to their `HeaderDisposition`.
///
/// Names are case-insensitive. Headers not in the policy are left outside
/// only.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(
    from = "BTreeMap<String, HeaderDisposition>",
    into = "BTreeMap<String, HeaderDisposition>"
)]
pub struct HeaderPolicy {
    dispositions: BTreeMap<String, HeaderDisposition>,
}

impl From<BTreeMap<String, HeaderDisposition>> for HeaderPolicy {
    fn from(map: BTreeMap<String, HeaderDisposition>) -> Self {
        HeaderPolicy {
            dispositions: map
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
        }
    }
}

impl From<HeaderPolicy> for BTreeMap<String, HeaderDisposition> {
    fn from(policy: HeaderPolicy) -> Self {
        policy.dispositions
    }
}

impl Default for HeaderPolicy {
    /// The usual set of Memory Hole headers: addressing, threading and date
    /// are protected, and the subject is hidden behind a placeholder while
    /// still being force-displayed.
    fn default() -> Self {
        let mut policy = HeaderPolicy::empty();
        for name in &[
            "From",
            "To",
            "Cc",
            "Date",
            "Message-ID",
            "In-Reply-To",
            "References",
            "Reply-To",
        ] {
            policy.set(name, HeaderDisposition::Protected);
        }
        policy.set(
            "Subject",
            HeaderDisposition::Replaced {
                force_display: true,
                replacement: Some("encrypted email".to_owned()),
            },
        );
        policy
    }
}

impl HeaderPolicy {
    /// A policy which protects nothing.
    pub fn empty() -> Self {
        HeaderPolicy {
            dispositions: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, name: &str, disposition: HeaderDisposition) {
        self.dispositions
            .insert(name.to_ascii_lowercase(), disposition);
    }

    pub fn disposition(&self, name: &str) -> Option<&HeaderDisposition> {
        self.dispositions.get(&name.to_ascii_lowercase())
    }

    /// Whether `name` is copied into the protected part.
    pub fn is_protected(&self, name: &str) -> bool {
        self.disposition(name).is_some()
    }

    /// Whether `name` must be force-displayed from the protected part.
    pub fn is_force_displayed(&self, name: &str) -> bool {
        matches!(
            self.disposition(name),
            Some(&HeaderDisposition::Replaced {
                force_display: true,
                ..
            })
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = HeaderPolicy::default();
        assert!(policy.is_protected("from"));
        assert!(policy.is_protected("MESSAGE-ID"));
        assert!(!policy.is_force_displayed("From"));
        assert!(policy.is_force_displayed("subject"));
        assert!(!policy.is_protected("Received"));
        assert!(!policy.is_protected("Bcc"));
    }

    #[test]
    fn policy_round_trips_through_toml() {
        let toml = toml::to_string(&HeaderPolicy::default()).unwrap();
        let parsed: HeaderPolicy = toml::from_str(&toml).unwrap();
        assert_eq!(HeaderPolicy::default(), parsed);
    }

    #[test]
    fn names_are_case_insensitive() {
        let policy: HeaderPolicy =
            toml::from_str("X-Secret = { disposition = \"replaced\" }\n")
                .unwrap();
        assert_eq!(
            Some(&HeaderDisposition::Replaced {
                force_display: false,
                replacement: None,
            }),
            policy.disposition("x-secret")
        );
        assert!(!policy.is_force_displayed("X-SECRET"));
    }
}
