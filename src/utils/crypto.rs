use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use rand::RngCore;
use ring::digest::{Context, SHA256};
use ring::pbkdf2;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use serde::Serialize;
use std::num::NonZeroU32;
use zeroize::Zeroize;

use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Salt shared by every node for secret derivation
const SECRET_SALT: &str = "0ffaa74d206930aaece253f090c88dbe6685b9e66ec49ad988d84fd7dff230d1";
const SECRET_ITERATIONS: NonZeroU32 = match NonZeroU32::new(10_000) {
    Some(n) => n,
    None => panic!("iterations must be non-zero"),
};
const SECRET_LEN: usize = 32;
const SEED_LEN: usize = 32;
const PASSWORD_SALT_LEN: usize = 16;

pub const DEFAULT_ID_LEN: usize = 64;

/// Deterministic Ed25519 key material, both halves hex encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub secret_key: String,
    pub public_key: String,
}

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    // Ensure the timestamp fits in i64
    if duration > i64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// Hex SHA-256 of a raw string
pub fn hash(data: &str) -> String {
    HEXLOWER.encode(&sha256_digest(data.as_bytes()))
}

/// Hex SHA-256 of the canonical JSON rendering of `value`
pub fn hash_json<T: Serialize>(value: &T) -> Result<String> {
    let json = crate::utils::to_canonical_json(value)?;
    Ok(hash(&json))
}

/// PBKDF2-HMAC-SHA512 stretch of `seed` with the network-wide salt
pub fn derive_secret(seed: &str) -> String {
    let mut out = [0u8; SECRET_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA512,
        SECRET_ITERATIONS,
        SECRET_SALT.as_bytes(),
        seed.as_bytes(),
        &mut out,
    );
    let secret = HEXLOWER.encode(&out);
    out.zeroize();
    secret
}

fn key_pair_from_secret(secret: &str) -> Result<Ed25519KeyPair> {
    let mut bytes = HEXLOWER_PERMISSIVE
        .decode(secret.as_bytes())
        .map_err(|e| BlockchainError::Crypto(format!("Secret is not valid hex: {e}")))?;
    if bytes.len() < SEED_LEN {
        bytes.zeroize();
        return Err(BlockchainError::Crypto(format!(
            "Secret must hold at least {SEED_LEN} bytes"
        )));
    }
    let key_pair = Ed25519KeyPair::from_seed_unchecked(&bytes[..SEED_LEN])
        .map_err(|e| BlockchainError::Crypto(format!("Failed to create Ed25519 key pair: {e}")));
    bytes.zeroize();
    key_pair
}

/// Same secret, same key pair
pub fn generate_keypair(secret: &str) -> Result<KeyMaterial> {
    let key_pair = key_pair_from_secret(secret)?;
    Ok(KeyMaterial {
        secret_key: secret.to_lowercase(),
        public_key: HEXLOWER.encode(key_pair.public_key().as_ref()),
    })
}

/// Signs the raw bytes of a hex message digest
pub fn sign(secret: &str, message_hash: &str) -> Result<String> {
    let key_pair = key_pair_from_secret(secret)?;
    let message = HEXLOWER_PERMISSIVE
        .decode(message_hash.as_bytes())
        .map_err(|e| BlockchainError::Crypto(format!("Message hash is not valid hex: {e}")))?;
    Ok(HEXLOWER.encode(key_pair.sign(&message).as_ref()))
}

pub fn verify(public_key: &str, signature: &str, message_hash: &str) -> bool {
    let decode = |s: &str| HEXLOWER_PERMISSIVE.decode(s.as_bytes()).ok();
    let (Some(public_key), Some(signature), Some(message)) =
        (decode(public_key), decode(signature), decode(message_hash))
    else {
        return false;
    };
    UnparsedPublicKey::new(&ED25519, public_key)
        .verify(&message, &signature)
        .is_ok()
}

/// Argon2id PHC string; slow on purpose, keep it off the validation path
pub fn password_digest(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; PASSWORD_SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to encode salt: {e}")))?;
    let digest = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to hash password: {e}")))?;
    Ok(digest.to_string())
}

pub fn check_password(password: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn random_id(len: usize) -> String {
    let mut bytes = vec![0u8; len / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    HEXLOWER.encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_derive_secret_is_deterministic() {
        let a = derive_secret("password-digest");
        let b = derive_secret("password-digest");
        assert_eq!(a, b);
        assert_eq!(a.len(), SECRET_LEN * 2);
        assert_ne!(a, derive_secret("another-digest"));
    }

    #[test]
    fn test_keypair_is_deterministic() {
        let secret = derive_secret("seed");
        let first = generate_keypair(&secret).unwrap();
        let second = generate_keypair(&secret).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.public_key.len(), 64);
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(generate_keypair("abcd").is_err());
        assert!(generate_keypair("not hex at all").is_err());
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let keys = generate_keypair(&derive_secret("signer")).unwrap();
        let digest = hash("message");
        let signature = sign(&keys.secret_key, &digest).unwrap();

        assert!(verify(&keys.public_key, &signature, &digest));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let keys = generate_keypair(&derive_secret("signer")).unwrap();
        let digest = hash("message");
        let signature = sign(&keys.secret_key, &digest).unwrap();

        let mut sig_bytes = HEXLOWER.decode(signature.as_bytes()).unwrap();
        sig_bytes[10] ^= 0x01;
        assert!(!verify(&keys.public_key, &HEXLOWER.encode(&sig_bytes), &digest));

        let mut msg_bytes = HEXLOWER.decode(digest.as_bytes()).unwrap();
        msg_bytes[0] ^= 0x80;
        assert!(!verify(&keys.public_key, &signature, &HEXLOWER.encode(&msg_bytes)));

        let other = generate_keypair(&derive_secret("someone else")).unwrap();
        assert!(!verify(&other.public_key, &signature, &digest));
        assert!(!verify("zz", &signature, &digest));
    }

    #[test]
    fn test_password_digest_round_trip() {
        let digest = password_digest("correct horse").unwrap();
        assert!(check_password("correct horse", &digest));
        assert!(!check_password("wrong horse", &digest));
        assert!(!check_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn test_random_id() {
        let a = random_id(DEFAULT_ID_LEN);
        let b = random_id(DEFAULT_ID_LEN);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
