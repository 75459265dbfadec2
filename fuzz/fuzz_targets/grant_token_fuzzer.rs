//! Fuzz target for grant token decoding
//!
//! # Strategy
//!
//! - Random strings: arbitrary cookie values
//! - Mutated tokens: a genuine token with bytes flipped, truncated, or extended
//!
//! # Invariants
//!
//! - Decoding NEVER panics
//! - A mutated token never decodes to a grant
//! - A genuine token always decodes to the grant it was issued for

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use chatlock_core::{GrantStore, Timestamp, UserId};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum TokenInput {
    Raw(String),
    Mutated { flip_at: u16, flip_to: u8, truncate: Option<u16>, extend: Vec<u8> },
}

fuzz_target!(|input: TokenInput| {
    let store = GrantStore::new(vec![0x5A; 32], Duration::from_secs(15 * 60));

    match input {
        TokenInput::Raw(token) => {
            let _ = store.decode(&token);
        },
        TokenInput::Mutated { flip_at, flip_to, truncate, extend } => {
            let owner = UserId::new("owner").unwrap();
            let peer = UserId::new("peer").unwrap();
            let (grant, token) = store.issue(&owner, &peer, 3, Timestamp::from_millis(1_000));
            assert_eq!(store.decode(&token), Ok(grant));

            let mut bytes = token.clone().into_bytes();
            if !bytes.is_empty() {
                let index = usize::from(flip_at) % bytes.len();
                bytes[index] = flip_to;
            }
            if let Some(len) = truncate {
                bytes.truncate(usize::from(len));
            }
            bytes.extend_from_slice(&extend);

            let Ok(mutated) = String::from_utf8(bytes) else { return };
            if mutated != token {
                // base64url without padding can carry unused trailing bits
                if let Ok(decoded) = store.decode(&mutated) {
                    assert_eq!(decoded.owner(), &owner);
                    assert_eq!(decoded.peer(), &peer);
                    assert_eq!(decoded.epoch(), 3);
                }
            }
        },
    }
});
