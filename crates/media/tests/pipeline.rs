//! End-to-end exercise of the blank-key path: a synthetic boot reply option
//! is parsed, the embedded key unwrapped, the media file decrypted and the
//! deployment variables extracted.

use aes::Aes128;
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockEncryptMut, KeyIvInit};
use media::{
    BlobReference, DEVICE_SECRET, derive, extract_variables, decrypt_media_file,
    parse_blob_reference, recover_media_password,
};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;

const MEDIA_PATH: &str = "\\SMSTemp\\2026.08.23.10.41.17.0001.{6B29FC40}.boot.var";

fn aes128_cbc_encrypt(key: &[u8; 16], data: &mut Vec<u8>) {
    let len = data.len();
    Aes128CbcEnc::new(key.into(), (&[0u8; 16]).into())
        .encrypt_padded_mut::<NoPadding>(data, len)
        .unwrap();
}

/// Wrap 10 key bytes the way a boot reply does: pad to one AES block,
/// encrypt under the device key and frame with 20 leading and 12 trailing
/// opaque bytes behind a length byte.
fn wrap_key(key_bytes: &[u8; 10]) -> Vec<u8> {
    let mut block = key_bytes.to_vec();
    block.resize(16, 0);
    aes128_cbc_encrypt(&derive(&DEVICE_SECRET).aes_key(), &mut block);

    let mut blob = vec![48u8];
    blob.extend_from_slice(&[0xC3; 20]);
    blob.extend_from_slice(&block);
    blob.extend_from_slice(&[0x3C; 12]);
    blob
}

fn encrypt_media_file(document: &str, secret: &[u8]) -> Vec<u8> {
    let mut plaintext: Vec<u8> = document.encode_utf16().flat_map(u16::to_le_bytes).collect();
    plaintext.push(0);
    plaintext.push(0);
    while !plaintext.len().is_multiple_of(16) {
        plaintext.push(0);
    }
    aes128_cbc_encrypt(&derive(secret).aes_key(), &mut plaintext);

    let mut file = vec![0u8; 24];
    file.extend_from_slice(&plaintext);
    file.extend_from_slice(&[0u8; 8]);
    file
}

fn boot_reply_option(blob: &[u8]) -> Vec<u8> {
    let mut data = vec![2u8, blob.len() as u8];
    data.extend_from_slice(blob);
    data.push(1);
    data.push(MEDIA_PATH.len() as u8);
    data.extend_from_slice(MEDIA_PATH.as_bytes());
    data
}

#[test]
fn test_blank_key_pipeline() {
    let key_bytes: [u8; 10] = [0x12, 0x8F, 0x00, 0xFF, 0x7F, 0x80, 0x41, 0xC3, 0x05, 0xE6];

    let document = "<MediaVarList Version=\"1\">\
        <var name=\"_SMSMediaGuid\">2f0b9f2c-6f1d-4d0a-9b5e-0123456789ab</var>\
        <var name=\"_SMSTSMediaPFX\">MIIKcQIBAzCCCjc=</var>\
        <var name=\"SMSTSMP\">https://mp01.corp.example.com</var>\
        <var name=\"_SMSTSSiteCode\">PS1</var>\
        <var name=\"_SMSTSx64UnknownMachineGUID\">e8d5a001-13f7-44a4-b2c6-fedcba987654</var>\
        </MediaVarList>";

    let option = boot_reply_option(&wrap_key(&key_bytes));
    let reference = parse_blob_reference(&option).unwrap();
    let BlobReference::BlankKey {
        media_path,
        encrypted_key,
    } = reference
    else {
        panic!("expected a blank-key reference");
    };
    assert_eq!(media_path, MEDIA_PATH);

    let password = recover_media_password(&encrypted_key).unwrap();
    assert_eq!(
        hex::encode(password),
        "12008fff0000ffff7f0080ff4100c3ff0500e6ff"
    );

    // Round-trip through disk the way the binary saves downloaded media.
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("media.boot.var");
    std::fs::write(&local, encrypt_media_file(document, &password)).unwrap();

    let file = std::fs::read(&local).unwrap();
    let decrypted = decrypt_media_file(&file, &password).unwrap();
    assert_eq!(decrypted, document);

    let variables = extract_variables(&decrypted).unwrap();
    assert_eq!(variables.site_code, "PS1");
    assert_eq!(variables.management_point_dns(), "mp01.corp.example.com");
    assert_eq!(variables.media_guid, "2f0b9f2c-6f1d-4d0a-9b5e-0123456789ab");
}
