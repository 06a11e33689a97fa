//! Secrets 모듈
//!
//! 플랫폼 raw key provider와 vscdb 시크릿 어댑터.
//!
//! - provider: DPAPI(v10) / 키링(v11) 계열 선택, raw key 1회 유도
//! - store: `secret://` 행을 레코드로 읽고 쓰기

pub mod provider;
pub mod store;

pub use provider::{KeyFamily, KeyProvider, KeySource};
pub use store::{ExtensionSecrets, SecretListing, SecretStore};
