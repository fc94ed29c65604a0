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

//! The seam between Memory Hole processing and an OpenPGP implementation.

use crate::memory_hole::protection::Fingerprint;
use crate::support::error::Error;

/// The result of a successful decryption.
#[derive(Clone, Debug)]
pub struct Decrypted {
    pub plaintext: Vec<u8>,
    /// The key the message was decrypted with.
    pub encrypted_to: Fingerprint,
    /// The key that validly signed the message inside the encryption, if
    /// any.
    pub signed_by: Option<Fingerprint>,
}

/// The result of checking a detached signature.
#[derive(Clone, Debug)]
pub struct Verification {
    pub valid: bool,
    /// The key that made the signature, if it could be identified.
    pub signer: Option<Fingerprint>,
}

/// An OpenPGP implementation.
///
/// Every method either succeeds completely or fails with
/// `Error::OpenPgp`. A signature that is merely bad is not a failure of
/// `verify`.
pub trait OpenPgp {
    /// Encrypts `plaintext` to every recipient, returning ASCII-armoured
    /// ciphertext.
    ///
    /// Recipients are bare `local@domain` addresses.
    fn encrypt(
        &mut self,
        plaintext: &[u8],
        recipients: &[String],
    ) -> Result<Vec<u8>, Error>;

    /// Makes an ASCII-armoured detached signature over `data`.
    fn sign(&mut self, data: &[u8]) -> Result<Vec<u8>, Error>;

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Decrypted, Error>;

    fn verify(
        &mut self,
        data: &[u8],
        signature: &[u8],
    ) -> Result<Verification, Error>;
}

#[cfg(test)]
pub use self::stub::StubOpenPgp;

#[cfg(test)]
mod stub {
    use super::*;
    use crate::mime::content_encoding::{
        base64_decode_lenient, base64_encode_wrapped,
    };
    use crate::support::error::Operation;

    const CIPHERTEXT_HEADER: &[u8] = b"-----BEGIN STUB MESSAGE-----\r\n";
    const SIGNATURE_HEADER: &[u8] = b"-----BEGIN STUB SIGNATURE-----\r\n";

    /// An in-memory `OpenPgp` which does no real cryptography but otherwise
    /// behaves like the real thing: ciphertext only decrypts back to what was
    /// encrypted, and signatures only verify against exactly the signed
    /// data.
    #[derive(Clone, Debug)]
    pub struct StubOpenPgp {
        /// The fingerprint reported for decryption.
        pub encrypt_key: String,
        /// The fingerprint reported for signatures.
        pub sign_key: String,
        /// Whether `encrypt` also signs.
        pub sign_on_encrypt: bool,
        /// Every operation performed, in order.
        pub calls: Vec<Operation>,
        /// The recipients passed to the last `encrypt` call.
        pub last_recipients: Vec<String>,
        /// An operation which always fails, as if the key were unusable.
        pub refuse: Option<Operation>,
    }

    impl Default for StubOpenPgp {
        fn default() -> Self {
            StubOpenPgp {
                encrypt_key: "E".to_owned(),
                sign_key: "S".to_owned(),
                sign_on_encrypt: true,
                calls: vec![],
                last_recipients: vec![],
                refuse: None,
            }
        }
    }

    impl StubOpenPgp {
        fn start(&mut self, operation: Operation) -> Result<(), Error> {
            self.calls.push(operation);
            if Some(operation) == self.refuse {
                Err(Error::openpgp(operation, "key unusable"))
            } else {
                Ok(())
            }
        }

        fn signature_for(&self, data: &[u8]) -> Vec<u8> {
            let mut signature = SIGNATURE_HEADER.to_vec();
            signature.extend_from_slice(self.sign_key.as_bytes());
            signature.extend_from_slice(b"\r\n");
            signature.extend_from_slice(&base64_encode_wrapped(data));
            signature
        }
    }

    impl OpenPgp for StubOpenPgp {
        fn encrypt(
            &mut self,
            plaintext: &[u8],
            recipients: &[String],
        ) -> Result<Vec<u8>, Error> {
            self.start(Operation::Encrypt)?;
            self.last_recipients = recipients.to_vec();

            let mut ciphertext = CIPHERTEXT_HEADER.to_vec();
            ciphertext.extend_from_slice(if self.sign_on_encrypt {
                &b"signed\r\n"[..]
            } else {
                &b"unsigned\r\n"[..]
            });
            ciphertext.extend_from_slice(&base64_encode_wrapped(plaintext));
            Ok(ciphertext)
        }

        fn sign(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
            self.start(Operation::Sign)?;
            Ok(self.signature_for(data))
        }

        fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Decrypted, Error> {
            self.start(Operation::Decrypt)?;

            let body = ciphertext
                .strip_prefix(CIPHERTEXT_HEADER)
                .ok_or_else(|| {
                    Error::openpgp(Operation::Decrypt, "no valid OpenPGP data")
                })?;
            let (signed, body) = if let Some(b) = body.strip_prefix(b"signed\r\n")
            {
                (true, b)
            } else if let Some(b) = body.strip_prefix(b"unsigned\r\n") {
                (false, b)
            } else {
                return Err(Error::openpgp(
                    Operation::Decrypt,
                    "corrupt message",
                ));
            };

            Ok(Decrypted {
                plaintext: base64_decode_lenient(body),
                encrypted_to: self.encrypt_key.as_str().into(),
                signed_by: if signed {
                    Some(self.sign_key.as_str().into())
                } else {
                    None
                },
            })
        }

        fn verify(
            &mut self,
            data: &[u8],
            signature: &[u8],
        ) -> Result<Verification, Error> {
            self.start(Operation::Verify)?;

            if !signature.starts_with(SIGNATURE_HEADER) {
                return Err(Error::openpgp(
                    Operation::Verify,
                    "no signature found",
                ));
            }

            Ok(Verification {
                valid: signature == &self.signature_for(data)[..],
                signer: Some(self.sign_key.as_str().into()),
            })
        }
    }
}
