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

//! `OpenPgp` implementation which drives the GnuPG command-line tool.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use super::openpgp::{Decrypted, OpenPgp, Verification};
use crate::memory_hole::protection::Fingerprint;
use crate::support::config::GpgConfig;
use crate::support::error::{Error, Operation};

lazy_static! {
    static ref RX_STATUS: Regex =
        Regex::new(r"^\[GNUPG:\] (\S+)(?: (.*))?$").unwrap();
}

/// One `[GNUPG:]` line from the status output.
#[derive(Clone, Debug, PartialEq, Eq)]
struct StatusLine {
    keyword: String,
    args: Vec<String>,
}

impl StatusLine {
    fn is(&self, keyword: &str) -> bool {
        self.keyword == keyword
    }

    fn arg(&self, ix: usize) -> Option<&str> {
        self.args.get(ix).map(String::as_str)
    }
}

#[derive(Debug)]
struct GpgOutput {
    success: bool,
    stdout: Vec<u8>,
    status: Vec<StatusLine>,
    /// Everything on stderr which wasn't a status line.
    diagnostics: String,
}

impl GpgOutput {
    fn failure_message(&self) -> String {
        if self.diagnostics.trim().is_empty() {
            "gpg reported failure".to_owned()
        } else {
            self.diagnostics.trim().to_owned()
        }
    }
}

/// Splits GnuPG's stderr into status lines and everything else.
fn parse_status(stderr: &[u8]) -> (Vec<StatusLine>, String) {
    let mut status = Vec::new();
    let mut diagnostics = String::new();

    for line in String::from_utf8_lossy(stderr).lines() {
        let line = line.trim_end();
        if let Some(cap) = RX_STATUS.captures(line) {
            status.push(StatusLine {
                keyword: cap[1].to_owned(),
                args: cap
                    .get(2)
                    .map(|a| {
                        a.as_str().split_whitespace().map(str::to_owned).collect()
                    })
                    .unwrap_or_default(),
            });
        } else {
            diagnostics.push_str(line);
            diagnostics.push('\n');
        }
    }

    (status, diagnostics)
}

/// The primary key fingerprint from a `VALIDSIG` line, falling back to the
/// signing key's own fingerprint on old versions that don't report it.
fn validsig_fingerprint(line: &StatusLine) -> Option<Fingerprint> {
    line.arg(9).or_else(|| line.arg(0)).map(Fingerprint::from)
}

fn interpret_decrypt(
    status: &[StatusLine],
) -> Result<(Fingerprint, Option<Fingerprint>), Error> {
    if status.iter().any(|s| s.is("DECRYPTION_FAILED"))
        || !status.iter().any(|s| s.is("DECRYPTION_OKAY"))
    {
        return Err(Error::openpgp(
            Operation::Decrypt,
            "gpg could not decrypt the message",
        ));
    }

    let encrypted_to = status
        .iter()
        .find(|s| s.is("DECRYPTION_KEY"))
        .and_then(|s| s.arg(1).or_else(|| s.arg(0)))
        .or_else(|| {
            status
                .iter()
                .find(|s| s.is("ENC_TO"))
                .and_then(|s| s.arg(0))
        })
        .map(Fingerprint::from)
        .ok_or_else(|| {
            Error::openpgp(
                Operation::Decrypt,
                "gpg did not report the decryption key",
            )
        })?;

    let signed_by = status
        .iter()
        .find(|s| s.is("VALIDSIG"))
        .and_then(validsig_fingerprint);

    Ok((encrypted_to, signed_by))
}

fn interpret_verify(
    status: &[StatusLine],
    success: bool,
    diagnostics: &str,
) -> Result<Verification, Error> {
    if let Some(valid) = status.iter().find(|s| s.is("VALIDSIG")) {
        return Ok(Verification {
            valid: true,
            signer: validsig_fingerprint(valid),
        });
    }

    if let Some(bad) = status
        .iter()
        .find(|s| s.is("BADSIG") || s.is("ERRSIG"))
    {
        return Ok(Verification {
            valid: false,
            signer: bad.arg(0).map(Fingerprint::from),
        });
    }

    if success {
        Ok(Verification {
            valid: false,
            signer: None,
        })
    } else {
        Err(Error::openpgp(
            Operation::Verify,
            if diagnostics.trim().is_empty() {
                "gpg reported failure"
            } else {
                diagnostics.trim()
            },
        ))
    }
}

/// Runs `gpg` in batch mode for each operation.
///
/// Keys come from GnuPG's own keyring; nothing here manages keys or trust.
#[derive(Clone, Debug)]
pub struct Gpg {
    config: GpgConfig,
}

impl Gpg {
    pub fn new(config: GpgConfig) -> Self {
        Gpg { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        if let Some(ref homedir) = self.config.homedir {
            cmd.arg("--homedir").arg(homedir);
        }
        cmd.args(&["--batch", "--no-tty", "--status-fd", "2"]);
        cmd
    }

    fn add_local_user(&self, cmd: &mut Command) {
        if let Some(ref key) = self.config.sign_key {
            cmd.arg("--local-user").arg(key);
        }
    }

    fn run(
        &self,
        operation: Operation,
        mut cmd: Command,
        input: &[u8],
    ) -> Result<GpgOutput, Error> {
        debug!("Running {:?}", cmd);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::openpgp(
                    operation,
                    format!(
                        "failed to run '{}': {}",
                        self.config.binary.display(),
                        e
                    ),
                )
            })?;

        // gpg may start writing output before it has read all its input, so
        // the input must be fed from another thread.
        let stdin = child.stdin.take();
        let output = thread::scope(|s| {
            if let Some(mut stdin) = stdin {
                s.spawn(move || {
                    if let Err(e) = stdin.write_all(input) {
                        debug!("gpg stopped reading its input: {}", e);
                    }
                });
            }

            child.wait_with_output()
        })
        .map_err(|e| Error::openpgp(operation, e.to_string()))?;

        let (status, diagnostics) = parse_status(&output.stderr);
        Ok(GpgOutput {
            success: output.status.success(),
            stdout: output.stdout,
            status,
            diagnostics,
        })
    }

    fn run_expecting_success(
        &self,
        operation: Operation,
        cmd: Command,
        input: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let output = self.run(operation, cmd, input)?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(Error::openpgp(operation, output.failure_message()))
        }
    }
}

impl OpenPgp for Gpg {
    fn encrypt(
        &mut self,
        plaintext: &[u8],
        recipients: &[String],
    ) -> Result<Vec<u8>, Error> {
        let mut cmd = self.command();
        cmd.args(&["--armor", "--encrypt"]);
        if self.config.sign_key.is_some() {
            cmd.arg("--sign");
            self.add_local_user(&mut cmd);
        }
        if self.config.always_trust {
            cmd.args(&["--trust-model", "always"]);
        }
        for recipient in recipients {
            cmd.arg("--recipient").arg(recipient);
        }

        let ciphertext =
            self.run_expecting_success(Operation::Encrypt, cmd, plaintext)?;
        info!("Encrypted message to {} recipient(s)", recipients.len());
        Ok(ciphertext)
    }

    fn sign(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut cmd = self.command();
        cmd.args(&["--armor", "--detach-sign", "--digest-algo", "SHA512"]);
        self.add_local_user(&mut cmd);
        self.run_expecting_success(Operation::Sign, cmd, data)
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Decrypted, Error> {
        let mut cmd = self.command();
        cmd.arg("--decrypt");

        // gpg exits with failure when an embedded signature can't be
        // checked even though decryption worked, so success is judged from
        // the status lines alone.
        let output = self.run(Operation::Decrypt, cmd, ciphertext)?;
        let (encrypted_to, signed_by) =
            interpret_decrypt(&output.status).map_err(|e| {
                if output.diagnostics.trim().is_empty() {
                    e
                } else {
                    Error::openpgp(
                        Operation::Decrypt,
                        output.failure_message(),
                    )
                }
            })?;

        info!(
            "Decrypted message for {} (signed by {})",
            encrypted_to,
            signed_by
                .as_ref()
                .map_or_else(|| "nobody".to_owned(), Fingerprint::to_string)
        );
        Ok(Decrypted {
            plaintext: output.stdout,
            encrypted_to,
            signed_by,
        })
    }

    fn verify(
        &mut self,
        data: &[u8],
        signature: &[u8],
    ) -> Result<Verification, Error> {
        let mut sig_file = tempfile::NamedTempFile::new()?;
        sig_file.write_all(signature)?;
        sig_file.flush()?;

        let mut cmd = self.command();
        cmd.arg("--verify").arg(sig_file.path()).arg("-");

        let output = self.run(Operation::Verify, cmd, data)?;
        let verification = interpret_verify(
            &output.status,
            output.success,
            &output.diagnostics,
        )?;

        if !verification.valid {
            warn!(
                "gpg rejected signature from {}",
                verification
                    .signer
                    .as_ref()
                    .map_or_else(|| "<unknown>".to_owned(), Fingerprint::to_string)
            );
        }
        Ok(verification)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const VALIDSIG: &str = "[GNUPG:] VALIDSIG 1111222233334444 2024-01-01 \
                            1704067200 0 4 0 1 10 00 \
                            AAAABBBBCCCCDDDD";

    fn status(text: &str) -> Vec<StatusLine> {
        parse_status(text.as_bytes()).0
    }

    #[test]
    fn status_lines_are_separated_from_diagnostics() {
        let (status, diagnostics) = parse_status(
            b"gpg: encrypted with 2048-bit RSA key\r\n\
              [GNUPG:] ENC_TO 0123456789ABCDEF 1 0\r\n\
              [GNUPG:] DECRYPTION_OKAY\n\
              gpg: some warning\n",
        );

        assert_eq!(
            vec![
                StatusLine {
                    keyword: "ENC_TO".to_owned(),
                    args: vec![
                        "0123456789ABCDEF".to_owned(),
                        "1".to_owned(),
                        "0".to_owned()
                    ],
                },
                StatusLine {
                    keyword: "DECRYPTION_OKAY".to_owned(),
                    args: vec![],
                },
            ],
            status
        );
        assert_eq!(
            "gpg: encrypted with 2048-bit RSA key\ngpg: some warning\n",
            diagnostics
        );
    }

    #[test]
    fn decryption_status() {
        let (enc, sig) = interpret_decrypt(&status(&format!(
            "[GNUPG:] ENC_TO 0123456789ABCDEF 1 0\n\
             [GNUPG:] DECRYPTION_KEY SUBKEYFPR PRIMARYFPR u\n\
             [GNUPG:] DECRYPTION_OKAY\n\
             {}\n",
            VALIDSIG
        )))
        .unwrap();
        assert_eq!(Fingerprint::from("PRIMARYFPR"), enc);
        assert_eq!(Some(Fingerprint::from("AAAABBBBCCCCDDDD")), sig);

        let (enc, sig) = interpret_decrypt(&status(
            "[GNUPG:] ENC_TO 0123456789ABCDEF 1 0\n\
             [GNUPG:] DECRYPTION_OKAY\n",
        ))
        .unwrap();
        assert_eq!(Fingerprint::from("0123456789ABCDEF"), enc);
        assert_eq!(None, sig);

        assert_matches!(
            Err(Error::OpenPgp {
                operation: Operation::Decrypt,
                ..
            }),
            interpret_decrypt(&status(
                "[GNUPG:] ENC_TO 0123456789ABCDEF 1 0\n\
                 [GNUPG:] DECRYPTION_FAILED\n"
            ))
        );
    }

    #[test]
    fn verification_status() {
        let v = interpret_verify(&status(VALIDSIG), true, "").unwrap();
        assert!(v.valid);
        assert_eq!(Some(Fingerprint::from("AAAABBBBCCCCDDDD")), v.signer);

        let v = interpret_verify(
            &status("[GNUPG:] BADSIG 1111222233334444 Someone\n"),
            false,
            "gpg: BAD signature",
        )
        .unwrap();
        assert!(!v.valid);
        assert_eq!(Some(Fingerprint::from("1111222233334444")), v.signer);

        let v = interpret_verify(
            &status("[GNUPG:] ERRSIG 1111222233334444 1 10 00 0 9\n"),
            false,
            "",
        )
        .unwrap();
        assert!(!v.valid);

        assert_matches!(
            Err(Error::OpenPgp {
                operation: Operation::Verify,
                ..
            }),
            interpret_verify(&[], false, "gpg: no valid OpenPGP data found")
        );
    }

    #[test]
    fn missing_binary_is_an_openpgp_error() {
        let mut gpg = Gpg::new(GpgConfig {
            binary: "/nonexistent/memoryhole-test/gpg".into(),
            ..GpgConfig::default()
        });

        assert_matches!(
            Err(Error::OpenPgp {
                operation: Operation::Sign,
                ..
            }),
            gpg.sign(b"data")
        );
        assert_matches!(
            Err(Error::OpenPgp {
                operation: Operation::Encrypt,
                ..
            }),
            gpg.encrypt(b"data", &["you@other.com".to_owned()])
        );
    }
}
