//! MECM PXE Boot Media Module
//!
//! Implements the parsing and cryptography needed to turn an MECM PXE boot
//! reply into a readable media variables document:
//!
//! - Vendor option parsing: the nested option 243 payload referencing the
//!   encrypted media variables file, and the option 252 boot descriptor.
//! - Key derivation: the CryptoAPI-style SHA-1 stretching scheme used by
//!   boot media, reproduced bit-for-bit.
//! - Blank-key recovery: unwrapping the media password embedded in the boot
//!   reply when the media was created without a password.
//! - Media file decryption: AES-128-CBC with the format's fixed zero IV,
//!   UTF-16LE decoding and NUL truncation.
//! - Variable extraction from the decrypted XML document.
//! - Hash formatting for offline cracking of password-protected media.
//!
//! Everything in this crate is a pure function of its byte inputs. Network
//! exchange and file retrieval live in the `dhcp` and `tftp` crates.

pub mod document;
pub mod file;
pub mod keys;
pub mod options;

pub use document::{MediaVariables, extract_variables};
pub use file::{decrypt_media_file, format_crack_hash, media_file_header};
pub use keys::{DEVICE_SECRET, DerivedKey, derive, password_bytes, recover_media_password};
pub use options::{BlobReference, RawOption, parse_blob_reference, parse_boot_descriptor};

use thiserror::Error;

/// Errors produced by the media parsing and decryption pipeline.
///
/// [`MediaError::DecryptionFailed`] is an expected outcome: a block cipher
/// cannot tell a wrong key from a right one, so a bad password only shows up
/// when the plaintext fails to decode. Callers should treat it as "try
/// another secret" rather than as a structural failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    /// Option 243 bytes violate the declared length/offset structure.
    #[error("malformed media reference option: {reason}")]
    MalformedOption { reason: &'static str },

    /// The boot reply carried no option 252.
    #[error("no boot descriptor (DHCP option 252) in the reply")]
    MissingBootDescriptor,

    /// The embedded key blob declares more bytes than it carries, or its
    /// framing is not the fixed 20 + 16 + 12 layout.
    #[error("malformed encrypted key blob: need {needed} bytes, have {available}")]
    MalformedKeyBlob { needed: usize, available: usize },

    /// The decrypted bytes are not a NUL-terminated UTF-16LE document,
    /// which is how a wrong password or key manifests.
    #[error("failed to decrypt media file (wrong password or key?)")]
    DecryptionFailed,

    /// The decrypted document parsed but a required variable is absent.
    #[error("media variables document is missing {variable:?}")]
    MalformedDocument { variable: &'static str },
}
