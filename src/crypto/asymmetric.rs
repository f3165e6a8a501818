//! # ECIES (§4.F Log Cryptor)
//!
//! Elliptic-curve integrated encryption: X25519 Diffie-Hellman + HKDF-SHA256 key
//! derivation + ChaCha20-Poly1305 AEAD. No particular curve or hash primitive is
//! mandated beyond minimum safety constraints (§1 non-goals), so this reuses the
//! construction already proven out for the rest of this codebase's
//! asymmetric-encryption needs.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// ECIES errors.
#[derive(Error, Debug)]
pub enum AsymmetricError {
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: authentication error or corrupted data")]
    DecryptionFailed,

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

pub type AsymmetricResult<T> = Result<T, AsymmetricError>;

/// An X25519 key pair.
#[derive(ZeroizeOnDrop)]
pub struct EciesKeyPair {
    private_key: StaticSecret,
    #[zeroize(skip)]
    public_key: X25519PublicKey,
}

impl EciesKeyPair {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        let private_key = StaticSecret::random_from_rng(OsRng);
        let public_key = X25519PublicKey::from(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> &X25519PublicKey {
        &self.public_key
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        *self.public_key.as_bytes()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// The private scalar's hex serialization, as wrapped by the Key Vault (§4.C).
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key.to_bytes())
    }

    /// Reconstruct a key pair from a raw private scalar.
    pub fn from_private_bytes(bytes: &[u8; 32]) -> Self {
        let private_key = StaticSecret::from(*bytes);
        let public_key = X25519PublicKey::from(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    /// Reconstruct a key pair from the hex serialization unwrapped from a `Key` row.
    pub fn from_private_hex(hex_str: &str) -> AsymmetricResult<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| AsymmetricError::InvalidKey(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AsymmetricError::InvalidKey("private scalar must be 32 bytes".into()))?;
        Ok(Self::from_private_bytes(&arr))
    }

    pub fn public_key_from_hex(hex_str: &str) -> AsymmetricResult<X25519PublicKey> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| AsymmetricError::InvalidKey(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AsymmetricError::InvalidKey("public key must be 32 bytes".into()))?;
        Ok(X25519PublicKey::from(arr))
    }

    /// Encrypt `plaintext` for `recipient_public_key`.
    pub fn encrypt(
        recipient_public_key: &X25519PublicKey,
        plaintext: &[u8],
    ) -> AsymmetricResult<EciesEncrypted> {
        let ephemeral_secret = StaticSecret::random_from_rng(OsRng);
        let ephemeral_public = X25519PublicKey::from(&ephemeral_secret);

        let shared_secret = ephemeral_secret.diffie_hellman(recipient_public_key);
        let derived_key = derive_key(shared_secret.as_bytes())?;

        let cipher = ChaCha20Poly1305::new((&derived_key).into());
        let nonce = fresh_nonce();
        let ciphertext = cipher
            .encrypt((&nonce).into(), plaintext)
            .map_err(|e| AsymmetricError::EncryptionFailed(e.to_string()))?;

        Ok(EciesEncrypted {
            ephemeral_public_key: ephemeral_public.as_bytes().to_owned(),
            nonce,
            ciphertext,
        })
    }

    /// Decrypt data addressed to this key pair.
    pub fn decrypt(&self, encrypted: &EciesEncrypted) -> AsymmetricResult<Vec<u8>> {
        let ephemeral_public = X25519PublicKey::from(encrypted.ephemeral_public_key);
        let shared_secret = self.private_key.diffie_hellman(&ephemeral_public);
        let derived_key = derive_key(shared_secret.as_bytes())?;

        let cipher = ChaCha20Poly1305::new((&derived_key).into());
        cipher
            .decrypt((&encrypted.nonce).into(), encrypted.ciphertext.as_slice())
            .map_err(|_| AsymmetricError::DecryptionFailed)
    }
}

impl std::fmt::Debug for EciesKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EciesKeyPair")
            .field("public_key", &hex::encode(self.public_key.as_bytes()))
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

fn derive_key(shared_secret: &[u8]) -> AsymmetricResult<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(Some(b"ECIES-v1"), shared_secret);
    let mut key = [0u8; 32];
    hkdf.expand(b"encryption", &mut key)
        .map_err(|e| AsymmetricError::EncryptionFailed(e.to_string()))?;
    Ok(key)
}

fn fresh_nonce() -> [u8; 12] {
    use rand::RngCore;
    let mut nonce = [0u8; 12];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// ECIES-encrypted payload.
#[derive(Debug, Clone, Zeroize)]
pub struct EciesEncrypted {
    pub ephemeral_public_key: [u8; 32],
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

impl EciesEncrypted {
    /// Serialize to bytes: `ephemeral_pk || nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 12 + self.ciphertext.len());
        out.extend_from_slice(&self.ephemeral_public_key);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(data: &[u8]) -> AsymmetricResult<Self> {
        if data.len() < 32 + 12 {
            return Err(AsymmetricError::InvalidKey(
                "data too short for ECIES format".into(),
            ));
        }
        let mut ephemeral_public_key = [0u8; 32];
        ephemeral_public_key.copy_from_slice(&data[0..32]);
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&data[32..44]);
        let ciphertext = data[44..].to_vec();

        Ok(Self {
            ephemeral_public_key,
            nonce,
            ciphertext,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecies_round_trip() {
        let keypair = EciesKeyPair::generate();
        let plaintext = b"a stack trace";
        let encrypted = EciesKeyPair::encrypt(keypair.public_key(), plaintext).unwrap();
        let decrypted = keypair.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn ecies_wrong_recipient_fails() {
        let alice = EciesKeyPair::generate();
        let bob = EciesKeyPair::generate();
        let encrypted = EciesKeyPair::encrypt(bob.public_key(), b"secret").unwrap();
        assert!(alice.decrypt(&encrypted).is_err());
    }

    #[test]
    fn private_hex_round_trip() {
        let keypair = EciesKeyPair::generate();
        let hex_str = keypair.private_key_hex();
        let restored = EciesKeyPair::from_private_hex(&hex_str).unwrap();
        assert_eq!(restored.public_key_bytes(), keypair.public_key_bytes());
    }

    #[test]
    fn serialization_round_trip() {
        let keypair = EciesKeyPair::generate();
        let encrypted = EciesKeyPair::encrypt(keypair.public_key(), b"data").unwrap();
        let bytes = encrypted.to_bytes();
        let recovered = EciesEncrypted::from_bytes(&bytes).unwrap();
        let decrypted = keypair.decrypt(&recovered).unwrap();
        assert_eq!(decrypted, b"data");
    }

    proptest::proptest! {
        /// §8 property 2: deriving the public half from an unwrapped private scalar
        /// always equals the public half stored alongside it.
        #[test]
        fn public_half_consistency_prop(raw in proptest::prelude::any::<[u8; 32]>()) {
            let keypair = EciesKeyPair::from_private_bytes(&raw);
            let restored = EciesKeyPair::from_private_hex(&keypair.private_key_hex()).unwrap();
            proptest::prop_assert_eq!(restored.public_key_bytes(), keypair.public_key_bytes());
        }

        /// §8 property 8 (the asymmetric half): ECIES round-trips arbitrary payloads
        /// through encrypt/decrypt for the intended recipient.
        #[test]
        fn ecies_round_trip_prop(plaintext in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512)) {
            let keypair = EciesKeyPair::generate();
            let encrypted = EciesKeyPair::encrypt(keypair.public_key(), &plaintext).unwrap();
            let decrypted = keypair.decrypt(&encrypted).unwrap();
            proptest::prop_assert_eq!(decrypted, plaintext);
        }
    }
}
