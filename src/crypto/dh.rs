//! Finite-field Diffie-Hellman over the 2048-bit MODP group 14 (RFC 3526).
//!
//! Public keys and shared secrets travel as unpadded big-endian integers,
//! which is what peers on the other end of the hello exchange produce.

use std::sync::LazyLock;

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::crypto::aes::{SecureKey, KEY_SIZE};
use crate::error::{AppError, Result};

const GROUP14_PRIME_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

struct Group {
    prime: BigUint,
    generator: BigUint,
}

static GROUP14: LazyLock<Group> = LazyLock::new(|| Group {
    prime: BigUint::parse_bytes(GROUP14_PRIME_HEX.as_bytes(), 16)
        .expect("group 14 prime is valid hex"),
    generator: BigUint::from(2u32),
});

/// An ephemeral key pair.
///
/// The private exponent is held as big-endian bytes that are wiped on drop.
/// `BigUint` cannot be zeroized, so the temporary integers built for each
/// `modpow` are freed without being cleared.
pub struct DhKeyPair {
    private: Zeroizing<Vec<u8>>,
    public: BigUint,
}

impl DhKeyPair {
    /// Draws a private exponent uniformly from `[2, p - 1)`.
    pub fn generate() -> Self {
        let group = &*GROUP14;
        let upper = &group.prime - 1u32;
        let exponent = OsRng.gen_biguint_range(&BigUint::from(2u32), &upper);
        let public = group.generator.modpow(&exponent, &group.prime);
        Self {
            private: Zeroizing::new(exponent.to_bytes_be()),
            public,
        }
    }

    /// Raw big-endian bytes of the public value.
    pub fn public_bytes(&self) -> Vec<u8> {
        self.public.to_bytes_be()
    }

    /// Computes `peer^private mod p`.
    ///
    /// Peer values outside `(1, p - 1)` are rejected; they would force the
    /// secret into a tiny subgroup.
    pub fn shared_secret(&self, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let group = &*GROUP14;
        let peer = BigUint::from_bytes_be(peer_public);
        let upper = &group.prime - 1u32;

        if peer <= BigUint::from(1u32) || peer >= upper {
            return Err(AppError::KeyExchange("peer public value out of range".to_string()));
        }

        let exponent = BigUint::from_bytes_be(&self.private);
        let secret = peer.modpow(&exponent, &group.prime);
        Ok(Zeroizing::new(secret.to_bytes_be()))
    }
}

/// The session encryption key: the leading 32 bytes of the shared secret.
pub fn session_key(shared_secret: &[u8]) -> Result<SecureKey> {
    if shared_secret.len() < KEY_SIZE {
        return Err(AppError::KeyExchange(format!(
            "shared secret too short: {} bytes",
            shared_secret.len()
        )));
    }
    SecureKey::from_slice(&shared_secret[..KEY_SIZE])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_prime_passes_fermat_check() {
        let group = &*GROUP14;
        assert_eq!(group.prime.bits(), 2048);
        let exp = &group.prime - 1u32;
        assert_eq!(group.generator.modpow(&exp, &group.prime), BigUint::from(1u32));
    }

    #[test]
    fn both_parties_agree_on_the_secret() {
        let alice = DhKeyPair::generate();
        let bob = DhKeyPair::generate();

        let a = alice.shared_secret(&bob.public_bytes()).unwrap();
        let b = bob.shared_secret(&alice.public_bytes()).unwrap();
        assert_eq!(*a, *b);

        let ka = session_key(&a).unwrap();
        let kb = session_key(&b).unwrap();
        assert_eq!(ka.as_bytes(), kb.as_bytes());
    }

    #[test]
    fn stored_exponent_reproduces_the_public_value() {
        let pair = DhKeyPair::generate();
        let exponent = BigUint::from_bytes_be(&pair.private);
        assert_eq!(GROUP14.generator.modpow(&exponent, &GROUP14.prime), pair.public);
    }

    #[test]
    fn degenerate_peer_values_are_rejected() {
        let pair = DhKeyPair::generate();
        let p_minus_one = (&GROUP14.prime - 1u32).to_bytes_be();

        assert!(pair.shared_secret(&[]).is_err());
        assert!(pair.shared_secret(&[1]).is_err());
        assert!(pair.shared_secret(&p_minus_one).is_err());
        assert!(pair.shared_secret(&GROUP14.prime.to_bytes_be()).is_err());
    }

    #[test]
    fn short_secret_cannot_produce_a_key() {
        assert!(session_key(&[0u8; 31]).is_err());
        assert!(session_key(&[9u8; 256]).is_ok());
    }
}
