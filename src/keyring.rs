//! Registered address -> public key mapping.
//!
//! Populated by the wallet-issuing collaborator when keys are handed out, and
//! consulted read-only by transaction and block verification. A sender whose
//! address has no registered key cannot get a transaction past the pool.

use crate::crypto::{self, Address};
use crate::error::{ChainError, Result};
use secp256k1::{constants::PUBLIC_KEY_SIZE, PublicKey};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    keys: HashMap<Address, Vec<u8>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compressed public key and return its derived address.
    /// Re-registering the same key is a no-op returning the same address.
    pub fn register(&mut self, public_key_bytes: &[u8]) -> Result<Address> {
        if public_key_bytes.len() != PUBLIC_KEY_SIZE {
            return Err(ChainError::Crypto(format!(
                "public key must be exactly {} bytes (compressed), got {}",
                PUBLIC_KEY_SIZE,
                public_key_bytes.len()
            )));
        }
        PublicKey::from_slice(public_key_bytes)
            .map_err(|e| ChainError::Crypto(format!("invalid public key: {}", e)))?;

        let address = crypto::derive_address(public_key_bytes);
        self.keys
            .entry(address.clone())
            .or_insert_with(|| public_key_bytes.to_vec());
        Ok(address)
    }

    /// Look up the registered public key for an address.
    pub fn lookup(&self, address: &str) -> Option<&[u8]> {
        self.keys.get(address).map(|k| k.as_slice())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.keys.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = KeyRegistry::new();
        let keypair = KeyPair::generate().unwrap();
        let address = registry.register(&keypair.public_key_bytes()).unwrap();

        assert_eq!(address, keypair.address());
        assert!(registry.contains(&address));
        assert_eq!(
            registry.lookup(&address),
            Some(keypair.public_key_bytes().as_slice())
        );
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = KeyRegistry::new();
        let keypair = KeyPair::generate().unwrap();
        let first = registry.register(&keypair.public_key_bytes()).unwrap();
        let second = registry.register(&keypair.public_key_bytes()).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_garbage() {
        let mut registry = KeyRegistry::new();
        assert!(registry.register(&[0u8; 10]).is_err());
        assert!(registry.register(&[0u8; 33]).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_unknown_address() {
        let registry = KeyRegistry::new();
        assert!(registry.lookup("deadbeef").is_none());
    }
}
