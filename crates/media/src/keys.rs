//! Key derivation and blank-key recovery for MECM boot media.
//!
//! Boot media keys come from a CryptoAPI-era `CryptDeriveKey` expansion of a
//! SHA-1 digest. The construction resembles HMAC-SHA1 (same 0x36/0x5C pad
//! constants, same 64-byte pad length) but is not one: the digest being
//! padded is of the secret itself and there is no keyed outer step. It has
//! to be reproduced here byte for byte; a library HMAC produces different
//! output.

use aes::Aes128;
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use sha1::{Digest, Sha1};

use crate::MediaError;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Device secret hardcoded in the boot loader (tspxe.dll), used to unwrap
/// the media password embedded in blank-password boot replies.
pub const DEVICE_SECRET: [u8; 16] = [
    0x9F, 0x67, 0x9C, 0x9B, 0x37, 0x3A, 0x1F, 0x48, 0x82, 0x4F, 0x37, 0x87, 0x33, 0xDE, 0x24, 0xE9,
];

// The media format encrypts everything with an all-zero IV. It is a format
// constant, never a parameter.
const ZERO_IV: [u8; 16] = [0u8; 16];

/// 40-byte output of the key stretching function.
///
/// Only the first 16 bytes are ever used (as an AES-128 key), but both
/// SHA-1 halves are kept so the construction stays observable in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedKey {
    outer: [u8; 20],
    inner: [u8; 20],
}

impl DerivedKey {
    /// The full 40-byte key material, outer half first.
    pub fn as_bytes(&self) -> [u8; 40] {
        let mut out = [0u8; 40];
        out[..20].copy_from_slice(&self.outer);
        out[20..].copy_from_slice(&self.inner);
        out
    }

    /// The AES-128 key: the first 16 bytes of the outer half.
    pub fn aes_key(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        key.copy_from_slice(&self.outer[..16]);
        key
    }
}

/// Derive the media decryption key from a secret of any length.
///
/// `SHA1(secret)` is XORed into a 64-byte pad of 0x36 and a 64-byte pad of
/// 0x5C; the output is `SHA1(pad36) || SHA1(pad5c)`.
pub fn derive(secret: &[u8]) -> DerivedKey {
    let digest = Sha1::digest(secret);

    let mut outer_pad = [0x36u8; 64];
    let mut inner_pad = [0x5Cu8; 64];
    for (i, byte) in digest.iter().enumerate() {
        outer_pad[i] ^= byte;
        inner_pad[i] ^= byte;
    }

    DerivedKey {
        outer: Sha1::digest(outer_pad).into(),
        inner: Sha1::digest(inner_pad).into(),
    }
}

/// Encode an operator password the way the boot loader does before key
/// derivation: UTF-16LE, no terminator.
pub fn password_bytes(password: &str) -> Vec<u8> {
    password.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

// Embedded key blob framing: a leading 20 bytes and a trailing 12 bytes
// around a single 16-byte AES block.
const KEY_BLOB_PREFIX: usize = 20;
const KEY_BLOB_SUFFIX: usize = 12;
const KEY_BLOB_LEN: usize = KEY_BLOB_PREFIX + 16 + KEY_BLOB_SUFFIX;

/// Recover the media password from the encrypted key blob carried in a
/// blank-password boot reply, with no operator input.
///
/// The blob's first byte declares its framed length; the framing wraps one
/// AES block which decrypts (under the [`DEVICE_SECRET`]-derived key) to 10
/// key bytes. Those are widened to the 20-byte secret the media file key is
/// derived from.
pub fn recover_media_password(blob: &[u8]) -> Result<[u8; 20], MediaError> {
    let (&declared, rest) = blob
        .split_first()
        .ok_or(MediaError::MalformedKeyBlob {
            needed: 1,
            available: 0,
        })?;
    let declared = declared as usize;

    let framed = rest.get(..declared).ok_or(MediaError::MalformedKeyBlob {
        needed: declared,
        available: rest.len(),
    })?;
    if framed.len() != KEY_BLOB_LEN {
        return Err(MediaError::MalformedKeyBlob {
            needed: KEY_BLOB_LEN,
            available: framed.len(),
        });
    }

    let mut block = [0u8; 16];
    block.copy_from_slice(&framed[KEY_BLOB_PREFIX..KEY_BLOB_PREFIX + 16]);

    let device_key = derive(&DEVICE_SECRET).aes_key();
    aes128_cbc_decrypt(&device_key, &mut block)?;

    let mut key_bytes = [0u8; 10];
    key_bytes.copy_from_slice(&block[..10]);
    Ok(sign_extend(&key_bytes))
}

/// Widen each recovered key byte to two: the byte itself followed by 0xFF
/// when its high bit is set, 0x00 otherwise.
///
/// This mirrors how the boot loader holds the key in memory (signed 8-bit
/// values widened to little-endian 16-bit units) before hashing it.
pub fn sign_extend(key_bytes: &[u8; 10]) -> [u8; 20] {
    let mut out = [0u8; 20];
    for (i, &byte) in key_bytes.iter().enumerate() {
        out[2 * i] = byte;
        out[2 * i + 1] = if byte & 0x80 != 0 { 0xFF } else { 0x00 };
    }
    out
}

/// Decrypt `data` in place with AES-128-CBC and the format's zero IV.
///
/// `data` must already be truncated to a multiple of the block size.
pub(crate) fn aes128_cbc_decrypt(key: &[u8; 16], data: &mut [u8]) -> Result<(), MediaError> {
    let cipher = Aes128CbcDec::new(key.into(), (&ZERO_IV).into());
    cipher
        .decrypt_padded_mut::<NoPadding>(data)
        .map_err(|_| MediaError::DecryptionFailed)?;
    Ok(())
}
