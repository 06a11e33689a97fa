//! Crypto Module
//!
//! raw key 유도와 os_crypt 봉투 코덱

pub mod envelope;
pub mod kdf;

pub use envelope::{decode, encode, EnvelopeError, EnvelopeVersion};
pub use kdf::{KeyDerivationError, RawKey};
