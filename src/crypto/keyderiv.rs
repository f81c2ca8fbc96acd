//! MD5-chain key derivation.
//!
//! ```text
//! k[0..16]  = MD5(R || P)
//! k[16..32] = MD5(k[0..16])
//! k[32..48] = MD5(k[0..32])
//! k[48..64] = MD5(k[0..48])
//! ```
//! where `R` is the 236-byte per-connection IV and `P` is the PSK, truncated
//! to 256 bytes before hashing.

use md5::{Digest, Md5};

use super::KEY_LEN;

fn md5(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.input(data);
    let digest = hasher.result();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

/// Derives the 64-byte key both ends use to seed their per-direction
/// keystreams. The PSK is truncated to exactly 256 bytes before it
/// contributes to the hash chain.
pub fn derive_key(iv: &[u8], psk: &[u8]) -> [u8; KEY_LEN] {
    let psk = &psk[..psk.len().min(256)];

    let mut key = [0u8; KEY_LEN];

    let mut seed = Vec::with_capacity(iv.len() + psk.len());
    seed.extend_from_slice(iv);
    seed.extend_from_slice(psk);

    key[0..16].copy_from_slice(&md5(&seed));
    key[16..32].copy_from_slice(&md5(&key[0..16]));
    key[32..48].copy_from_slice(&md5(&key[0..32]));
    key[48..64].copy_from_slice(&md5(&key[0..48]));

    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let iv = [7u8; 236];
        let psk = b"a shared secret";
        assert_eq!(derive_key(&iv, psk), derive_key(&iv, psk));
    }

    #[test]
    fn different_iv_yields_different_key() {
        let mut iv_a = [0u8; 236];
        let mut iv_b = [0u8; 236];
        iv_a[0] = 1;
        iv_b[0] = 2;
        let psk = b"same psk";
        assert_ne!(derive_key(&iv_a, psk), derive_key(&iv_b, psk));
    }

    #[test]
    fn overlong_psk_is_truncated_before_hashing() {
        let iv = [3u8; 236];
        let mut long_psk = vec![b'k'; 256];
        let truncated = derive_key(&iv, &long_psk);

        long_psk.extend(vec![b'z'; 50]); // bytes past 256 must not affect the key
        let extended = derive_key(&iv, &long_psk);

        assert_eq!(truncated, extended);
    }
}
