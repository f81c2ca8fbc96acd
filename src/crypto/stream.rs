//! In-place stream encryption, backed by OpenSSL's RC4.
//!
//! Each direction of a connection gets its own keystream generator seeded
//! from the same 64-byte derived key: the two directions must stay
//! independent, since a sender only ever advances its own encrypting
//! keystream and a receiver only its own decrypting one. RC4 gives us this
//! for free — instantiating two independent RC4 states from the same key
//! produces two independent keystreams, each advancing in lock-step between
//! peers because both ends process the same byte sequence through the same
//! state evolution.

use std::io;

use openssl::symm::{Cipher, Crypter, Mode};

use super::KEY_LEN;

fn cipher_err(e: openssl::error::ErrorStack) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

/// Per-connection cipher state: one RC4 keystream per direction, both seeded
/// from the same derived key. Never re-initialized once created.
pub struct CipherState {
    encryptor: Crypter,
    decryptor: Crypter,
}

impl CipherState {
    /// `enc_init`: seeds both directions' keystreams from the 64-byte
    /// derived key.
    pub fn new(key: &[u8; KEY_LEN]) -> io::Result<CipherState> {
        let cipher = Cipher::rc4();
        let encryptor = Crypter::new(cipher, Mode::Encrypt, key, None).map_err(cipher_err)?;
        let decryptor = Crypter::new(cipher, Mode::Decrypt, key, None).map_err(cipher_err)?;
        Ok(CipherState { encryptor, decryptor })
    }

    /// `io_encrypt`: xors `buf` with the encrypt-direction keystream, in
    /// place, advancing that keystream's position by `buf.len()`.
    pub fn encrypt(&mut self, buf: &mut [u8]) -> io::Result<()> {
        Self::apply(&mut self.encryptor, buf)
    }

    /// `io_decrypt`: the decrypt-direction counterpart of `encrypt`.
    pub fn decrypt(&mut self, buf: &mut [u8]) -> io::Result<()> {
        Self::apply(&mut self.decryptor, buf)
    }

    fn apply(crypter: &mut Crypter, buf: &mut [u8]) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        // RC4 is a stream cipher: output length equals input length. OpenSSL
        // asks for a little slack in the output buffer regardless.
        let mut out = vec![0u8; buf.len() + Cipher::rc4().block_size()];
        let n = crypter.update(buf, &mut out).map_err(cipher_err)?;
        debug_assert_eq!(n, buf.len());
        buf.copy_from_slice(&out[..buf.len()]);
        Ok(())
    }

    /// Splits the two directions apart so each can be owned by a separate
    /// relay task, running concurrently, without sharing a lock over a
    /// single `CipherState`.
    pub fn into_halves(self) -> (Encryptor, Decryptor) {
        (Encryptor(self.encryptor), Decryptor(self.decryptor))
    }
}

/// One direction's keystream, owned independently of its sibling.
pub struct Encryptor(Crypter);

impl Encryptor {
    pub fn apply(&mut self, buf: &mut [u8]) -> io::Result<()> {
        CipherState::apply(&mut self.0, buf)
    }
}

pub struct Decryptor(Crypter);

impl Decryptor {
    pub fn apply(&mut self, buf: &mut [u8]) -> io::Result<()> {
        CipherState::apply(&mut self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_key;

    #[test]
    fn encrypt_then_decrypt_is_identity() {
        let key = derive_key(&[9u8; 236], b"round-trip psk");
        let mut tx = CipherState::new(&key).unwrap();
        let mut rx = CipherState::new(&key).unwrap();

        let original = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut buf = original.clone();

        tx.encrypt(&mut buf).unwrap();
        assert_ne!(buf, original);

        rx.decrypt(&mut buf).unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn keystream_advances_across_calls() {
        let key = derive_key(&[1u8; 236], b"psk");
        let mut cipher = CipherState::new(&key).unwrap();

        let mut first = b"AAAA".to_vec();
        let mut second = b"AAAA".to_vec();
        cipher.encrypt(&mut first).unwrap();
        cipher.encrypt(&mut second).unwrap();

        // Same plaintext at two different stream positions must not produce
        // the same ciphertext.
        assert_ne!(first, second);
    }

    #[test]
    fn empty_buffer_is_a_no_op() {
        let key = derive_key(&[2u8; 236], b"psk");
        let mut cipher = CipherState::new(&key).unwrap();
        let mut buf: Vec<u8> = Vec::new();
        cipher.encrypt(&mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
