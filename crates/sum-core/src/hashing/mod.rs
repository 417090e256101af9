//! Hashing y serialización canónica.

pub mod canonical_json;
pub mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_parts, hash_str};
