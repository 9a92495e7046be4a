//! Utility functions and helpers
//!
//! Cryptographic primitives and the canonical JSON routines every node
//! must agree on byte-for-byte.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    check_password, current_timestamp, derive_secret, generate_keypair, hash, hash_json,
    password_digest, random_id, sha256_digest, sign, verify, KeyMaterial, DEFAULT_ID_LEN,
};

pub use serialization::{deserialize_all, from_json, serialize_all, to_canonical_json};
