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

//! Builds PGP/MIME messages (RFC 3156) whose headers are protected by the
//! signature and, optionally, the encryption.

use log::{debug, info, warn};

use super::policy::{HeaderDisposition, HeaderPolicy};
use crate::crypt::OpenPgp;
use crate::mime::header;
use crate::mime::part::{Header, Part};
use crate::support::error::Error;
use crate::support::separator::{RandomSeparatorGen, SeparatorGen};

const DEFAULT_CONTENT_TYPE: &str = "text/plain; charset=us-ascii";

/// Wraps messages in signed or signed-and-encrypted PGP/MIME containers.
pub struct Protector<'a> {
    openpgp: &'a mut dyn OpenPgp,
    policy: &'a HeaderPolicy,
    sgen: Box<dyn SeparatorGen + 'a>,
}

impl<'a> Protector<'a> {
    pub fn new(openpgp: &'a mut dyn OpenPgp, policy: &'a HeaderPolicy) -> Self {
        Self::with_separators(openpgp, policy, Box::new(RandomSeparatorGen))
    }

    pub fn with_separators(
        openpgp: &'a mut dyn OpenPgp,
        policy: &'a HeaderPolicy,
        sgen: Box<dyn SeparatorGen + 'a>,
    ) -> Self {
        Protector {
            openpgp,
            policy,
            sgen,
        }
    }

    /// Produces the protected form of `message`.
    ///
    /// With `encrypt`, the result is `multipart/encrypted`, addressed to
    /// everyone in `To`, `Cc` and `Bcc`, with the outer headers obscured as
    /// the policy says. Otherwise the result is `multipart/signed` and the
    /// outer headers are left as they were.
    ///
    /// `message` itself is not modified.
    pub fn protect(
        &mut self,
        message: &Part,
        encrypt: bool,
    ) -> Result<Part, Error> {
        let inner = self.inner_part(message);
        let outer_headers = outer_headers(message);

        if encrypt {
            self.encrypt(message, inner, outer_headers)
        } else {
            self.sign(inner, outer_headers)
        }
    }

    fn encrypt(
        &mut self,
        message: &Part,
        inner: Part,
        outer_headers: Vec<Header>,
    ) -> Result<Part, Error> {
        let recipients = recipients(message);
        debug!("Encrypting to {} recipient(s)", recipients.len());
        let ciphertext =
            self.openpgp.encrypt(&inner.to_bytes(), &recipients)?;

        let version = Part::leaf(
            vec![
                Header::new("Content-Type", "application/pgp-encrypted"),
                Header::new(
                    "Content-Description",
                    "PGP/MIME version identification",
                ),
            ],
            b"Version: 1\r\n".to_vec(),
        );
        let payload = Part::leaf(
            vec![
                Header::new(
                    "Content-Type",
                    "application/octet-stream; name=\"msg.asc\"",
                ),
                Header::new("Content-Description", "OpenPGP encrypted message"),
                Header::new("Content-Disposition", "inline; filename=\"msg.asc\""),
            ],
            ciphertext,
        );

        let mut container = Part::multipart(
            outer_headers,
            "multipart/encrypted; protocol=\"application/pgp-encrypted\"",
            self.sgen.gen(),
            vec![version, payload],
        );

        for h in message.headers() {
            if let Some(&HeaderDisposition::Replaced {
                ref replacement, ..
            }) = self.policy.disposition(h.name())
            {
                match *replacement {
                    Some(ref placeholder) => {
                        container.set_header(h.name(), placeholder.as_str())
                    },
                    None => container.remove_header(h.name()),
                }
            }
        }

        info!("Protected message with encryption");
        Ok(container)
    }

    fn sign(
        &mut self,
        mut inner: Part,
        outer_headers: Vec<Header>,
    ) -> Result<Part, Error> {
        inner.encode_leaves_base64();
        let signature = self.openpgp.sign(&inner.to_canonical_bytes())?;

        let signature = Part::leaf(
            vec![
                Header::new(
                    "Content-Type",
                    "application/pgp-signature; name=\"signature.asc\"",
                ),
                Header::new("Content-Description", "OpenPGP digital signature"),
                Header::new(
                    "Content-Disposition",
                    "attachment; filename=\"signature.asc\"",
                ),
            ],
            signature,
        );

        info!("Protected message with signature only");
        Ok(Part::multipart(
            outer_headers,
            "multipart/signed; micalg=\"pgp-sha512\"; \
             protocol=\"application/pgp-signature\"",
            self.sgen.gen(),
            vec![inner, signature],
        ))
    }

    /// Builds the part that goes under the signature or encryption: the
    /// original content, marked with `protected-headers`, carrying every
    /// header the policy covers.
    fn inner_part(&mut self, message: &Part) -> Part {
        let protected = message
            .headers()
            .iter()
            .filter(|h| {
                !h.is_content_header()
                    && !h.is("Bcc")
                    && self.policy.is_protected(h.name())
            })
            .cloned()
            .collect::<Vec<_>>();

        let mut content_headers = message
            .headers()
            .iter()
            .filter(|h| h.is_content_header())
            .cloned()
            .collect::<Vec<_>>();
        if !content_headers.iter().any(|h| h.is("Content-Type")) {
            content_headers
                .insert(0, Header::new("Content-Type", DEFAULT_CONTENT_TYPE));
        }

        let displayed = protected
            .iter()
            .filter(|h| self.policy.is_force_displayed(h.name()))
            .map(|h| format!("{}: {}\r\n", h.name(), h.value()))
            .collect::<String>();

        if displayed.is_empty() {
            let mut headers = protected;
            headers.extend(content_headers.into_iter().map(mark_protected));
            return Part::new(headers, message.body().clone());
        }

        let block = Part::leaf(
            vec![
                Header::new(
                    "Content-Type",
                    "text/rfc822-headers; protected-headers=\"v1\"",
                ),
                Header::new("Content-Disposition", "inline"),
            ],
            displayed.into_bytes(),
        );
        let body = Part::new(content_headers, message.body().clone());

        Part::multipart(
            protected,
            "multipart/mixed; protected-headers=\"v1\"",
            self.sgen.gen(),
            vec![block, body],
        )
    }
}

/// Protects `message` with the random boundary generator.
pub fn protect(
    message: &Part,
    encrypt: bool,
    policy: &HeaderPolicy,
    openpgp: &mut dyn OpenPgp,
) -> Result<Part, Error> {
    Protector::new(openpgp, policy).protect(message, encrypt)
}

fn mark_protected(h: Header) -> Header {
    if h.is("Content-Type") {
        Header::new(
            h.name(),
            header::append_parm(h.value(), "protected-headers", "v1"),
        )
    } else {
        h
    }
}

fn outer_headers(message: &Part) -> Vec<Header> {
    let mut headers = message
        .headers()
        .iter()
        .filter(|h| {
            !h.is_content_header() && !h.is("Bcc") && !h.is("MIME-Version")
        })
        .cloned()
        .collect::<Vec<_>>();
    headers.push(Header::new("MIME-Version", "1.0"));
    headers
}

/// Every distinct mailbox in `To`, `Cc` and `Bcc`, in order of appearance.
///
/// Unparsable headers contribute nothing.
fn recipients(message: &Part) -> Vec<String> {
    let mut recipients = Vec::<String>::new();
    for name in &["To", "Cc", "Bcc"] {
        for value in message.header_all(name) {
            let addresses = match header::parse_address_list(value.as_bytes())
            {
                Some(addresses) => addresses,
                None => {
                    warn!("Ignoring unparsable {} header: {:?}", name, value);
                    continue;
                },
            };

            for mailbox in addresses.iter().flat_map(|a| a.mailboxes()) {
                let addr = mailbox.addr.to_bare_string();
                if !recipients.contains(&addr) {
                    recipients.push(addr);
                }
            }
        }
    }
    recipients
}
