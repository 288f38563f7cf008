//! Encrypted media variables file handling.
//!
//! A media variables file is a fixed 24-byte header, AES-128-CBC ciphertext,
//! and a fixed 8-byte trailer. The plaintext is a UTF-16LE XML document
//! padded with NULs out to the file's length.

use crate::MediaError;
use crate::keys::{aes128_cbc_decrypt, derive};

/// Leading file bytes skipped before decryption.
pub const MEDIA_HEADER_LEN: usize = 24;
/// Trailing file bytes discarded before decryption.
pub const MEDIA_TRAILER_LEN: usize = 8;
/// Header bytes summarized into the offline crack hash.
pub const CRACK_HEADER_LEN: usize = 40;

const AES_BLOCK_SIZE: usize = 16;

/// Decrypt a media variables file with the given secret and decode it.
///
/// The secret is either the 20-byte output of
/// [`crate::recover_media_password`] or an operator password passed through
/// [`crate::password_bytes`]. A wrong secret surfaces as
/// [`MediaError::DecryptionFailed`] when the plaintext fails to decode; the
/// cipher itself gives no signal.
pub fn decrypt_media_file(file: &[u8], secret: &[u8]) -> Result<String, MediaError> {
    let body = file
        .get(MEDIA_HEADER_LEN..file.len().saturating_sub(MEDIA_TRAILER_LEN))
        .ok_or(MediaError::DecryptionFailed)?;

    // Truncate down to whole blocks. A trailing partial block is dropped,
    // never padded: real media files keep their padding inside the last
    // aligned block.
    let usable = body.len() - body.len() % AES_BLOCK_SIZE;
    let mut plaintext = body[..usable].to_vec();

    let key = derive(secret).aes_key();
    aes128_cbc_decrypt(&key, &mut plaintext)?;

    decode_document(&plaintext)
}

/// Decode plaintext as UTF-16LE, truncate at the last NUL and keep only
/// printable characters.
fn decode_document(plaintext: &[u8]) -> Result<String, MediaError> {
    let units: Vec<u16> = plaintext
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let text = String::from_utf16(&units).map_err(|_| MediaError::DecryptionFailed)?;
    let end = text.rfind('\0').ok_or(MediaError::DecryptionFailed)?;

    Ok(text[..end].chars().filter(|c| !c.is_control()).collect())
}

/// First [`CRACK_HEADER_LEN`] bytes of a media file, or `None` when the file
/// is shorter than that.
pub fn media_file_header(file: &[u8]) -> Option<[u8; CRACK_HEADER_LEN]> {
    file.get(..CRACK_HEADER_LEN)?.try_into().ok()
}

/// Format a media file header as a crackable hash string for offline
/// password recovery.
pub fn format_crack_hash(header: &[u8; CRACK_HEADER_LEN]) -> String {
    format!("$sccm$aes128${}", hex::encode(header))
}

#[cfg(test)]
mod tests {
    use aes::Aes128;
    use aes::cipher::block_padding::NoPadding;
    use aes::cipher::{BlockEncryptMut, KeyIvInit};

    use super::*;
    use crate::keys::password_bytes;

    type Aes128CbcEnc = cbc::Encryptor<Aes128>;

    /// UTF-16LE encode `text`, NUL-pad to a block multiple, and encrypt it
    /// the way a distribution point would.
    fn encrypt_document(text: &str, secret: &[u8]) -> Vec<u8> {
        let mut plaintext: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        plaintext.push(0);
        plaintext.push(0);
        while !plaintext.len().is_multiple_of(AES_BLOCK_SIZE) {
            plaintext.push(0);
        }

        let key = derive(secret).aes_key();
        let len = plaintext.len();
        Aes128CbcEnc::new((&key).into(), (&[0u8; 16]).into())
            .encrypt_padded_mut::<NoPadding>(&mut plaintext, len)
            .unwrap();
        plaintext
    }

    fn media_file(ciphertext: &[u8]) -> Vec<u8> {
        let mut file = vec![0xA5u8; MEDIA_HEADER_LEN];
        file.extend_from_slice(ciphertext);
        file.extend_from_slice(&[0x5Au8; MEDIA_TRAILER_LEN]);
        file
    }

    #[test]
    fn test_round_trip() {
        let document = "<MediaVarList><var name=\"X\">1</var></MediaVarList>";
        let secret = password_bytes("hunter2");

        let file = media_file(&encrypt_document(document, &secret));
        let decrypted = decrypt_media_file(&file, &secret).unwrap();
        assert_eq!(decrypted, document);
    }

    #[test]
    fn test_wrong_password_is_decryption_failed() {
        let document = "<MediaVarList><var name=\"X\">1</var></MediaVarList>";
        let file = media_file(&encrypt_document(document, &password_bytes("right")));

        let result = decrypt_media_file(&file, &password_bytes("wrong"));
        assert_eq!(result, Err(MediaError::DecryptionFailed));
    }

    #[test]
    fn test_partial_trailing_block_is_dropped() {
        let document = "0123456789a"; // 11 chars -> 22 bytes, one block + padding
        let secret = password_bytes("hunter2");
        let mut ciphertext = encrypt_document(document, &secret);
        assert_eq!(ciphertext.len(), 32);

        // 31 usable ciphertext bytes: only the first 16 get decrypted, the
        // other 15 are dropped. The document's first eight characters live
        // in that first block, but the NUL terminator does not, so this
        // reads as a wrong password.
        ciphertext.truncate(31);
        let result = decrypt_media_file(&media_file(&ciphertext), &secret);
        assert_eq!(result, Err(MediaError::DecryptionFailed));

        // With the terminator inside the surviving block the truncated file
        // still decrypts, proving exactly one block was used.
        let short = "abc"; // 6 bytes + NUL padding, all in block one
        let mut ciphertext = encrypt_document(short, &secret);
        ciphertext.extend_from_slice(&[0xEE; 15]); // partial garbage block
        let decrypted = decrypt_media_file(&media_file(&ciphertext), &secret).unwrap();
        assert_eq!(decrypted, short);
    }

    #[test]
    fn test_degenerate_file_lengths() {
        assert_eq!(
            decrypt_media_file(&[], b"secret"),
            Err(MediaError::DecryptionFailed)
        );
        assert_eq!(
            decrypt_media_file(&[0u8; MEDIA_HEADER_LEN], b"secret"),
            Err(MediaError::DecryptionFailed)
        );
    }

    #[test]
    fn test_crack_hash_format() {
        let mut header = [0u8; CRACK_HEADER_LEN];
        for (i, byte) in header.iter_mut().enumerate() {
            *byte = i as u8;
        }

        let hash = format_crack_hash(&header);
        assert!(hash.starts_with("$sccm$aes128$000102"));
        assert_eq!(hash.len(), "$sccm$aes128$".len() + CRACK_HEADER_LEN * 2);
        assert_eq!(
            hash,
            "$sccm$aes128$000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f2021222324252627"
        );
    }

    #[test]
    fn test_header_extraction() {
        assert!(media_file_header(&[0u8; 39]).is_none());
        let header = media_file_header(&[0x42u8; 64]).unwrap();
        assert_eq!(header, [0x42u8; CRACK_HEADER_LEN]);
    }
}
