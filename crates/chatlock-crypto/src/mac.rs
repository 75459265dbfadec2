//! Grant token authentication using HMAC-SHA256

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Domain label mixed into every grant MAC
const GRANT_LABEL: &[u8] = b"chatlock-grant-v1";

/// HMAC-SHA256 output size (32 bytes)
pub const GRANT_TAG_SIZE: usize = 32;

/// Compute the grant tag over `claims`.
pub fn sign_grant(secret: &[u8], claims: &[u8]) -> [u8; GRANT_TAG_SIZE] {
    let mut mac = new_mac(secret);
    mac.update(claims);

    let mut tag = [0u8; GRANT_TAG_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

/// Check `tag` against `claims` in constant time.
pub fn verify_grant(secret: &[u8], claims: &[u8], tag: &[u8]) -> bool {
    let mut mac = new_mac(secret);
    mac.update(claims);
    mac.verify_slice(tag).is_ok()
}

fn new_mac(secret: &[u8]) -> HmacSha256 {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(GRANT_LABEL);
    mac
}
