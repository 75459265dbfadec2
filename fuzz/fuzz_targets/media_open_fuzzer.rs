//! Fuzz target for the media decrypt path
//!
//! # Strategy
//!
//! - Arbitrary metadata records and blobs through the client-side decode
//! - Stored objects with tampered ciphertext, tag, iv, or salt
//!
//! # Invariants
//!
//! - Metadata decoding and `split_combined` NEVER panic
//! - Any tampering is an authentication failure, never wrong plaintext

#![no_main]

use arbitrary::Arbitrary;
use chatlock_crypto::{MediaContext, MediaMetadata, decrypt, open_media, seal_media, split_combined};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum MediaInput {
    Client { metadata_json: String, blob: Vec<u8> },
    Tamper { plaintext: Vec<u8>, target: Target, index: u16, xor: u8 },
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Target {
    Ciphertext,
    Tag,
    Iv,
    Salt,
}

const MASTER: [u8; 32] = [0x42; 32];

fuzz_target!(|input: MediaInput| {
    match input {
        MediaInput::Client { metadata_json, blob } => {
            let Ok(metadata) = serde_json::from_str::<MediaMetadata>(&metadata_json) else {
                return;
            };
            let _ = metadata.ensure_complete();
            let (Ok(key), Ok(iv)) = (metadata.decode_key(), metadata.decode_iv()) else {
                return;
            };
            if let Ok((ciphertext, tag)) = split_combined(&blob) {
                let _ = decrypt(ciphertext, key.bytes(), &iv, &tag);
            }
        },
        MediaInput::Tamper { plaintext, target, index, xor } => {
            let context = MediaContext::new("m1", "image");
            let mut object =
                seal_media(&MASTER, &context, &plaintext, "image/png", [7; 16], [9; 12]);
            assert_eq!(open_media(&MASTER, &context, &object).unwrap(), plaintext);

            if xor == 0 {
                return;
            }
            let index = usize::from(index);
            let bytes: &mut [u8] = match target {
                Target::Ciphertext => &mut object.ciphertext,
                Target::Tag => &mut object.auth_tag,
                Target::Iv => &mut object.iv,
                Target::Salt => &mut object.salt,
            };
            if bytes.is_empty() {
                return;
            }
            let at = index % bytes.len();
            bytes[at] ^= xor;

            assert!(open_media(&MASTER, &context, &object).is_err());
        },
    }
});
