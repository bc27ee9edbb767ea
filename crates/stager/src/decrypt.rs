//! Ogg stream decryption.
//!
//! Licensed Ogg audio is a raw AES-128-CTR stream under a fixed
//! counter block, with service padding ahead of the first Ogg page.
//! Decrypt in one pass, then drop everything before the first `OggS`
//! capture pattern.

use std::path::Path;

use aes::Aes128;
use cipher::{KeyIvInit, StreamCipher};

use crate::error::StageError;

type OggStreamCipher = ctr::Ctr64BE<Aes128>;

/// Fixed counter block: 8-byte nonce followed by the 8-byte initial
/// counter value.
const COUNTER_BLOCK: [u8; 16] = [
    0x72, 0xe0, 0x67, 0xfb, 0xdd, 0xcb, 0xcf, 0x77, 0xeb, 0xe8, 0xbc, 0x64, 0x3f, 0x63, 0x0d, 0x93,
];

/// Decrypt `input` into `output`, trimming the padding prefix.
pub async fn decrypt_ogg_stream(
    key: &[u8],
    input: &Path,
    output: &Path,
) -> Result<(), StageError> {
    let encrypted = tokio::fs::read(input).await?;
    let decrypted = decrypt_and_trim(key, encrypted)?;
    tokio::fs::write(output, decrypted).await?;
    Ok(())
}

fn decrypt_and_trim(key: &[u8], mut data: Vec<u8>) -> Result<Vec<u8>, StageError> {
    let mut cipher = OggStreamCipher::new_from_slices(key, &COUNTER_BLOCK)
        .map_err(|_| StageError::MalformedKey("content key is not 16 bytes".to_string()))?;
    cipher.apply_keystream(&mut data);

    let offset = memchr::memmem::find(&data, b"OggS").ok_or(StageError::OggMarkerNotFound)?;
    data.drain(..offset);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 16] = [7; 16];

    fn encrypt(plain: &[u8]) -> Vec<u8> {
        let mut data = plain.to_vec();
        let mut cipher = OggStreamCipher::new_from_slices(&KEY, &COUNTER_BLOCK).unwrap();
        cipher.apply_keystream(&mut data);
        data
    }

    #[test]
    fn recovers_stream_and_drops_padding() {
        let plain = b"paddingpaddingOggS\x00rest of the stream";
        let decrypted = decrypt_and_trim(&KEY, encrypt(plain)).unwrap();
        assert_eq!(decrypted, b"OggS\x00rest of the stream");
    }

    #[test]
    fn stream_starting_at_the_marker_is_untouched() {
        let plain = b"OggS\x02page zero";
        let decrypted = decrypt_and_trim(&KEY, encrypt(plain)).unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn missing_marker_is_a_hard_error() {
        let err = decrypt_and_trim(&KEY, encrypt(b"no marker anywhere")).unwrap_err();
        assert!(matches!(err, StageError::OggMarkerNotFound));
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let err = decrypt_and_trim(&[1, 2, 3], b"OggS".to_vec()).unwrap_err();
        assert!(matches!(err, StageError::MalformedKey(_)));
    }
}
