//! Local license gate. A license is a checksummed JSON document bound to the machine it was
//! activated on. Activation happens offline with a promo code whose SHA-256 digest is listed
//! in the configuration.

pub mod machine;
pub mod manager;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `value`.
pub fn sha256_hex(value: impl AsRef<[u8]>) -> String {
    format!("{:x}", Sha256::digest(value.as_ref()))
}
