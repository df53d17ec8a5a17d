//! Throwaway catalog construction for tests.

use std::path::PathBuf;

use chrono::Utc;
use silo_config::{ClientConfig, SiloConfig};
use silo_model::device::{DeviceId, FsUuid};
use silo_store::CatalogStore;

/// Open a fresh, empty catalog backed by an in-memory SQLite database.
///
/// # Panics
///
/// Panics if the in-memory connection cannot be established or migrated,
/// which would indicate a bug in [`silo_store`] rather than in the caller.
pub async fn temp_store() -> CatalogStore {
    CatalogStore::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory catalog")
}

/// Register a device with a synthetic filesystem UUID, returning its id.
///
/// # Panics
///
/// Panics if the insert fails, which would indicate a bug in the catalog
/// schema rather than in the caller.
pub async fn seed_device(store: &CatalogStore, label: &str, mount_point: &str) -> DeviceId {
    store
        .register_device(&FsUuid(format!("uuid-{label}")), &format!("/dev/{label}"), mount_point, "ext4", Utc::now())
        .await
        .expect("failed to register device")
}

/// Build a resolved [`SiloConfig`] fixture, pointed at `seeding_domain_roots`
/// and a `/cold/pool/{payload_hash}` pool template, with a loopback torrent
/// client placeholder.
#[must_use]
pub fn sample_config(seeding_domain_roots: Vec<PathBuf>) -> SiloConfig {
    SiloConfig {
        catalog_path: PathBuf::from("silo.db"),
        seeding_domain_roots,
        pool_payload_root_template: "/cold/pool/{payload_hash}".to_string(),
        hash_concurrency: 1,
        freshness: std::time::Duration::from_secs(86_400),
        backup_suffix: ".silo-bak".to_string(),
        client: ClientConfig {
            url: "http://127.0.0.1:8080".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn temp_store_starts_empty() {
        let store = temp_store().await;
        let devices = store.list_devices().await.unwrap();
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn seed_device_registers_a_distinct_device() {
        let store = temp_store().await;
        let warm = seed_device(&store, "warm", "/mnt/warm").await;
        let cold = seed_device(&store, "cold", "/mnt/cold").await;
        assert_ne!(warm, cold);
    }

    #[test]
    fn sample_config_renders_pool_template() {
        let config = sample_config(vec![PathBuf::from("/warm/seeding")]);
        assert_eq!(config.pool_payload_root("abc123"), PathBuf::from("/cold/pool/abc123"));
        assert!(config.is_in_seeding_domain(&PathBuf::from("/warm/seeding/show")));
    }
}
