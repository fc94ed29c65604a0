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
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::Error;
use crate::memory_hole::policy::HeaderPolicy;

/// The configuration for the `memoryhole` tool.
///
/// Every section is optional; an empty file gives the defaults.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct Config {
    /// If set, the path to a `log4rs` configuration file which replaces the
    /// default logging to standard error.
    #[serde(default)]
    pub log_config: Option<PathBuf>,

    /// Options for unwrapping received messages.
    #[serde(default)]
    pub unwrap: UnwrapConfig,

    /// Options for the GnuPG backend.
    #[serde(default)]
    pub gpg: GpgConfig,

    /// Which headers are protected, and which of those are hidden from the
    /// outside of encrypted messages.
    ///
    /// If absent, the built-in default policy is used. If present, it
    /// replaces the default policy entirely.
    #[serde(default)]
    pub policy: Option<HeaderPolicy>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = fs::read(path)?;
        Ok(toml::from_slice(&data)?)
    }

    /// The header policy in effect.
    pub fn header_policy(&self) -> HeaderPolicy {
        self.policy.clone().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct UnwrapConfig {
    /// The maximum nesting depth of MIME parts walked while unwrapping.
    ///
    /// Anything nested deeper makes the message malformed.
    pub max_depth: u32,

    /// What to do with a detached signature that does not verify.
    pub invalid_signature: InvalidSignaturePolicy,
}

impl Default for UnwrapConfig {
    fn default() -> Self {
        UnwrapConfig {
            max_depth: 20,
            invalid_signature: InvalidSignaturePolicy::Flag,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidSignaturePolicy {
    /// Count the signature in `MemoryHoleMessage::invalid_signatures`, log a
    /// warning, and otherwise treat the part as unsigned.
    Flag,
    /// Fail the whole unwrap with `Error::InvalidSignature`.
    Reject,
}

impl Default for InvalidSignaturePolicy {
    fn default() -> Self {
        InvalidSignaturePolicy::Flag
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct GpgConfig {
    /// The GnuPG executable. Looked up in `PATH` unless it contains a slash.
    pub binary: PathBuf,

    /// If set, passed as `--homedir`.
    pub homedir: Option<PathBuf>,

    /// If set, the key used for signing, passed as `--local-user`.
    ///
    /// Encryption also signs when this is set.
    pub sign_key: Option<String>,

    /// Pass `--trust-model always`, so that recipient keys need not be
    /// certified.
    pub always_trust: bool,
}

impl Default for GpgConfig {
    fn default() -> Self {
        GpgConfig {
            binary: "gpg".into(),
            homedir: None,
            sign_key: None,
            always_trust: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory_hole::policy::HeaderDisposition;

    #[test]
    fn empty_config_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(None, config.log_config);
        assert_eq!(20, config.unwrap.max_depth);
        assert_eq!(
            InvalidSignaturePolicy::Flag,
            config.unwrap.invalid_signature
        );
        assert_eq!(PathBuf::from("gpg"), config.gpg.binary);
        assert!(!config.gpg.always_trust);
        assert_eq!(HeaderPolicy::default(), config.header_policy());
    }

    #[test]
    fn full_config() {
        let config: Config = toml::from_str(
            r#"
log_config = "/etc/memoryhole/log4rs.toml"

[unwrap]
max_depth = 8
invalid_signature = "reject"

[gpg]
binary = "/usr/bin/gpg2"
homedir = "/tmp/gnupg"
sign_key = "0xDEADBEEF"
always_trust = true

[policy]
subject = { disposition = "replaced", force_display = true, replacement = "..." }
Message-ID = { disposition = "replaced", force_display = false }
from = { disposition = "protected" }
"#,
        )
        .unwrap();

        assert_eq!(
            Some(PathBuf::from("/etc/memoryhole/log4rs.toml")),
            config.log_config
        );
        assert_eq!(8, config.unwrap.max_depth);
        assert_eq!(
            InvalidSignaturePolicy::Reject,
            config.unwrap.invalid_signature
        );
        assert_eq!(Some(PathBuf::from("/tmp/gnupg")), config.gpg.homedir);
        assert_eq!(Some("0xDEADBEEF"), config.gpg.sign_key.as_deref());

        let policy = config.header_policy();
        assert_eq!(
            Some(&HeaderDisposition::Replaced {
                force_display: true,
                replacement: Some("...".to_owned()),
            }),
            policy.disposition("Subject")
        );
        assert_eq!(
            Some(&HeaderDisposition::Replaced {
                force_display: false,
                replacement: None,
            }),
            policy.disposition("message-id")
        );
        assert_eq!(
            Some(&HeaderDisposition::Protected),
            policy.disposition("FROM")
        );
        assert_eq!(None, policy.disposition("to"));
    }

    #[test]
    fn bad_config() {
        assert!(toml::from_str::<Config>(
            "[unwrap]\ninvalid_signature = \"ignore\"\n"
        )
        .is_err());
    }
}
