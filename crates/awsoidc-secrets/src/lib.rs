//! Credential stores for aws-cli-oidc.
//!
//! Each store keeps at most one credential per IAM role.

pub mod memory;
pub mod os_keyring;

pub use memory::MemoryStore;
pub use os_keyring::{KeyringStore, SERVICE_NAME};
