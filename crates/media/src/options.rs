//! Parsing of the vendor-specific options MECM adds to a PXE boot reply.
//!
//! Option 243 carries a nested, variable-length reference to the encrypted
//! media variables file on the distribution point's TFTP server. Its first
//! byte selects one of two layouts:
//!
//! - type 1: `| 1 | len | path (len bytes) |` means the media file is
//!   protected by an operator-chosen password.
//! - type 2: `| 2 | len | encrypted key (len bytes) | tag | plen | path |`
//!   means the media was created with a blank password and the reply embeds
//!   the encrypted key that unlocks it, followed by a second record holding
//!   the path.
//!
//! Option 252 carries the boot descriptor (BCD) path and plays no part in
//! decryption.

use crate::MediaError;

/// Boot descriptor (BCD file location) option number.
const OPTION_BOOT_DESCRIPTOR: u8 = 252;

/// A raw DHCP option as it appeared in the boot reply, in reply order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOption {
    pub number: u8,
    pub data: Vec<u8>,
}

impl RawOption {
    pub fn new(number: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            number,
            data: data.into(),
        }
    }
}

/// Parsed reference to the encrypted media variables file.
///
/// The embedded key is part of the `BlankKey` variant so that "key material
/// present iff the media has a blank password" holds by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobReference {
    /// The media file is protected by an operator-chosen password that has
    /// to be recovered offline (see [`crate::format_crack_hash`]).
    PasswordProtected { media_path: String },

    /// The media file has a blank password; `encrypted_key` can be unwrapped
    /// with no operator input (see [`crate::recover_media_password`]).
    BlankKey {
        media_path: String,
        encrypted_key: Vec<u8>,
    },
}

impl BlobReference {
    /// Path of the media variables file on the distribution point.
    pub fn media_path(&self) -> &str {
        match self {
            Self::PasswordProtected { media_path } => media_path,
            Self::BlankKey { media_path, .. } => media_path,
        }
    }
}

/// Parse the option 243 payload into a [`BlobReference`].
pub fn parse_blob_reference(data: &[u8]) -> Result<BlobReference, MediaError> {
    let [packet_type, data_length, rest @ ..] = data else {
        return Err(MediaError::MalformedOption {
            reason: "option shorter than its two-byte prefix",
        });
    };
    let data_length = *data_length as usize;

    match packet_type {
        1 => {
            let path = rest.get(..data_length).ok_or(MediaError::MalformedOption {
                reason: "declared path length exceeds option data",
            })?;
            Ok(BlobReference::PasswordProtected {
                media_path: decode_path(path)?,
            })
        }
        2 => {
            let encrypted_key = rest
                .get(..data_length)
                .ok_or(MediaError::MalformedOption {
                    reason: "declared key length exceeds option data",
                })?
                .to_vec();

            // The path follows as a second nested record: a tag byte, a
            // length byte, then the string itself.
            let [_, path_length, path_data @ ..] = &rest[data_length..] else {
                return Err(MediaError::MalformedOption {
                    reason: "no path record after the embedded key",
                });
            };
            let path = path_data
                .get(..*path_length as usize)
                .ok_or(MediaError::MalformedOption {
                    reason: "declared path length exceeds option data",
                })?;

            Ok(BlobReference::BlankKey {
                media_path: decode_path(path)?,
                encrypted_key,
            })
        }
        _ => Err(MediaError::MalformedOption {
            reason: "unknown media reference type",
        }),
    }
}

/// Find the boot descriptor (option 252) in the reply's option sequence,
/// strip trailing NUL padding and decode it.
pub fn parse_boot_descriptor(options: &[RawOption]) -> Result<String, MediaError> {
    let descriptor = options
        .iter()
        .find(|opt| opt.number == OPTION_BOOT_DESCRIPTOR)
        .ok_or(MediaError::MissingBootDescriptor)?;

    let end = descriptor
        .data
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |pos| pos + 1);

    decode_path(&descriptor.data[..end])
}

fn decode_path(bytes: &[u8]) -> Result<String, MediaError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| MediaError::MalformedOption {
        reason: "path is not valid UTF-8",
    })
}
