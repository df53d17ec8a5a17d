//! Shared dependencies threaded through every command handler.

use silo_client::TorrentClient;
use silo_config::SiloConfig;
use silo_events::EventBus;
use silo_model::device::Device;
use silo_store::CatalogStore;

use crate::error::{AppError, AppResult};

/// Dependencies available to every command handler.
pub(crate) struct AppContext {
    pub(crate) config: SiloConfig,
    pub(crate) store: CatalogStore,
    pub(crate) events: EventBus,
}

impl AppContext {
    /// Open the catalog database named by the resolved configuration.
    pub(crate) async fn connect(config: SiloConfig) -> AppResult<Self> {
        let absolute_path = if config.catalog_path.is_absolute() {
            config.catalog_path.clone()
        } else {
            std::env::current_dir()
                .map_err(|source| AppError::Argument(format!("cannot resolve current directory: {source}")))?
                .join(&config.catalog_path)
        };
        let database_url = format!("sqlite://{}", absolute_path.display());
        let store = CatalogStore::connect(&database_url).await?;
        Ok(Self {
            config,
            store,
            events: EventBus::new(),
        })
    }

    /// Connect to the configured torrent client, required to pause/resume
    /// torrents during apply.
    pub(crate) async fn client(&self) -> AppResult<TorrentClient> {
        let client = &self.config.client;
        Ok(TorrentClient::connect(&client.url, &client.username, &client.password).await?)
    }

    /// Resolve a device selector — a catalog id, an alias, or a filesystem
    /// UUID — to the matching [`Device`] row.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Argument`] if the selector does not resolve to
    /// exactly one known device.
    pub(crate) async fn resolve_device(&self, selector: &str) -> AppResult<Device> {
        if let Ok(id) = selector.parse::<i64>() {
            return Ok(self.store.get_device(silo_model::device::DeviceId(id)).await?);
        }

        let devices = self.store.list_devices().await?;
        devices
            .into_iter()
            .find(|device| {
                device.alias.as_deref() == Some(selector) || device.fs_uuid.0 == selector
            })
            .ok_or_else(|| {
                AppError::argument(format!(
                    "no device matches '{selector}' (expected a device id, alias, or fs_uuid)"
                ))
            })
    }
}
