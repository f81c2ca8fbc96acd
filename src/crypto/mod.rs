//! Key derivation and stream encryption framing.
//!
//! The stream cipher primitive itself is treated as a black-box keystream
//! function: this module wraps OpenSSL's RC4 implementation behind a small
//! interface that the rest of the crate drives without needing to know how
//! the keystream is produced.

pub mod keyderiv;
pub mod stream;

pub use keyderiv::derive_key;
pub use stream::CipherState;

/// Length in bytes of the derived key.
pub const KEY_LEN: usize = 64;

/// Length in bytes of the per-connection IV.
pub const IV_LEN: usize = 236;
