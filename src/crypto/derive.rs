use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use zeroize::Zeroize;

use crate::crypto::aes::SecureKey;

/// Derives the session signing key from the encryption key and `hmac_seed`.
///
/// NOT a cryptographic KDF. The output is a seeded Fisher-Yates permutation of
/// the input bytes and the seed travels in clear in the final hello frame, so
/// anyone holding the encryption key can recompute it. Both handshake roles
/// must run exactly this loop (index `n` from 32 down to 1, swap `n - 1` with
/// `rand(n)`) or their signatures stop agreeing.
pub fn derive_signing_key(key: &SecureKey, seed: i64) -> SecureKey {
    let mut bytes = *key.as_bytes();
    let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);

    for n in (1..=bytes.len()).rev() {
        let j = int31n(&mut rng, n as u32) as usize;
        bytes.swap(n - 1, j);
    }

    let derived = SecureKey::new(bytes);
    bytes.zeroize();
    derived
}

/// Uniform integer in `[0, n)` drawn from the top 31 bits of the stream.
fn int31n(rng: &mut ChaCha8Rng, n: u32) -> u32 {
    let mut next = || (rng.next_u64() >> 33) as u32;

    if n & (n - 1) == 0 {
        return next() & (n - 1);
    }

    let max = (1u32 << 31) - 1 - (1u32 << 31) % n;
    let mut v = next();
    while v > max {
        v = next();
    }
    v % n
}
