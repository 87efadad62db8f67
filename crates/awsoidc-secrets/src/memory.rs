//! In-memory credential store.
//!
//! Stores entries in their serialized form so it exercises the same
//! encoding the OS store uses.

use async_trait::async_trait;
use awsoidc_core::ports::CredentialStore;
use awsoidc_core::{Error, Result, RoleArn, TemporaryCredential};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw entry, e.g. one written by an older release.
    pub fn insert_raw(&self, role_arn: &RoleArn, value: impl Into<String>) -> Result<()> {
        self.write()?.insert(role_arn.as_str().to_string(), value.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.entries
            .write()
            .map_err(|_| Error::SecretStore("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, role_arn: &RoleArn) -> Result<Option<TemporaryCredential>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::SecretStore("memory store lock poisoned".to_string()))?;
        entries
            .get(role_arn.as_str())
            .map(|raw| serde_json::from_str(raw).map_err(Error::from))
            .transpose()
    }

    async fn put(&self, role_arn: &RoleArn, credential: &TemporaryCredential) -> Result<()> {
        let raw = serde_json::to_string(credential)?;
        self.write()?.insert(role_arn.as_str().to_string(), raw);
        debug!(role_arn = %role_arn, "Credential stored in memory");
        Ok(())
    }

    async fn delete(&self, role_arn: &RoleArn) -> Result<bool> {
        Ok(self.write()?.remove(role_arn.as_str()).is_some())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn role(name: &str) -> RoleArn {
        RoleArn::parse(&format!("arn:aws:iam::123456789012:role/{name}")).unwrap()
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        let dev = role("dev");
        let credential = TemporaryCredential::new(
            "AK",
            "SK",
            "ST",
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).single(),
        );

        assert!(store.get(&dev).await.unwrap().is_none());

        store.put(&dev, &credential).await.unwrap();
        assert_eq!(store.get(&dev).await.unwrap(), Some(credential.clone()));
        assert!(store.get(&role("ops")).await.unwrap().is_none());

        assert!(store.delete(&dev).await.unwrap());
        assert!(!store.delete(&dev).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn reads_legacy_entries_without_expiration() {
        let store = MemoryStore::new();
        let dev = role("dev");
        store
            .insert_raw(
                &dev,
                r#"{"AWSAccessKey":"AK","AWSSecretKey":"SK","AWSSessionToken":"ST","Version":1}"#,
            )
            .unwrap();

        let credential = store.get(&dev).await.unwrap().unwrap();
        assert_eq!(credential.access_key, "AK");
        assert!(credential.expiration.is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_is_an_error() {
        let store = MemoryStore::new();
        let dev = role("dev");
        store.insert_raw(&dev, "not json").unwrap();
        assert!(store.get(&dev).await.is_err());
    }
}
