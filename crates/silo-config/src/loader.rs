//! Load configuration from an optional TOML file plus environment variable
//! overrides.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ConfigError;
use crate::model::{
    ClientConfig, RawConfig, SiloConfig, DEFAULT_BACKUP_SUFFIX, DEFAULT_CATALOG_PATH,
    DEFAULT_FRESHNESS_SECS, DEFAULT_HASH_CONCURRENCY,
};
use crate::validate::{ensure_nonempty, ensure_positive, ensure_template_has_placeholder};
use crate::ConfigResult;

/// Environment variable overriding the catalog database path.
pub const ENV_CATALOG_PATH: &str = "SILO_CATALOG_PATH";
/// Environment variable naming the torrent client's base URL.
pub const ENV_CLIENT_URL: &str = "SILO_CLIENT_URL";
/// Environment variable naming the torrent client username.
pub const ENV_CLIENT_USERNAME: &str = "SILO_CLIENT_USERNAME";
/// Environment variable naming the torrent client password.
pub const ENV_CLIENT_PASSWORD: &str = "SILO_CLIENT_PASSWORD";

/// Default location searched for a configuration file when none is given
/// explicitly.
pub const DEFAULT_CONFIG_FILE: &str = "silo.toml";

/// Load and validate the toolkit configuration.
///
/// `explicit_path` is the path passed via `--config`, if any. When absent,
/// [`DEFAULT_CONFIG_FILE`] is tried in the current directory and silently
/// skipped if it does not exist; an explicitly named path that does not
/// exist is an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, if a required
/// environment variable is missing, or if a resolved field fails
/// validation.
pub fn load(explicit_path: Option<&Path>) -> ConfigResult<SiloConfig> {
    let raw = match explicit_path {
        Some(path) => read_toml(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                read_toml(&default_path)?
            } else {
                info!(
                    path = %default_path.display(),
                    "no config file found, using defaults and environment overrides"
                );
                RawConfig::default()
            }
        }
    };

    resolve(raw)
}

fn read_toml(path: &Path) -> ConfigResult<RawConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve(raw: RawConfig) -> ConfigResult<SiloConfig> {
    let catalog_path = env::var(ENV_CATALOG_PATH)
        .ok()
        .map(PathBuf::from)
        .or(raw.catalog_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH));

    let pool_payload_root_template = ensure_template_has_placeholder(
        raw.pool_payload_root_template
            .unwrap_or_else(|| "/cold/data/{payload_hash}".to_string()),
        "pool_payload_root_template",
    )?;

    let hash_concurrency = ensure_positive(
        raw.hash_concurrency.unwrap_or(DEFAULT_HASH_CONCURRENCY),
        "hash_concurrency",
    )?;

    let freshness = Duration::from_secs(raw.freshness_secs.unwrap_or(DEFAULT_FRESHNESS_SECS));

    let backup_suffix = ensure_nonempty(
        raw.backup_suffix.unwrap_or_else(|| DEFAULT_BACKUP_SUFFIX.to_string()),
        "backup_suffix",
    )?;

    if raw.seeding_domain_roots.is_empty() {
        warn!("no seeding_domain_roots configured; every hardlink neighbor will be treated as an external consumer");
    }

    let client = resolve_client(raw.client)?;

    Ok(SiloConfig {
        catalog_path,
        seeding_domain_roots: raw.seeding_domain_roots,
        pool_payload_root_template,
        hash_concurrency,
        freshness,
        backup_suffix,
        client,
    })
}

fn resolve_client(raw: crate::model::RawClientConfig) -> ConfigResult<ClientConfig> {
    let url = env::var(ENV_CLIENT_URL).ok().or(raw.url).ok_or(ConfigError::MissingEnvVar {
        name: ENV_CLIENT_URL,
    })?;
    let username = env::var(ENV_CLIENT_USERNAME)
        .ok()
        .or(raw.username)
        .ok_or(ConfigError::MissingEnvVar {
            name: ENV_CLIENT_USERNAME,
        })?;
    let password = env::var(ENV_CLIENT_PASSWORD)
        .ok()
        .or(raw.password)
        .ok_or(ConfigError::MissingEnvVar {
            name: ENV_CLIENT_PASSWORD,
        })?;

    Ok(ClientConfig {
        url: ensure_nonempty(url, "client.url")?,
        username: ensure_nonempty(username, "client.username")?,
        password: ensure_nonempty(password, "client.password")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawClientConfig;
    use std::io::Write;

    fn raw_with_client() -> RawConfig {
        RawConfig {
            client: RawClientConfig {
                url: Some("http://localhost:8080".to_string()),
                username: Some("admin".to_string()),
                password: Some("hunter2".to_string()),
            },
            ..RawConfig::default()
        }
    }

    #[test]
    fn resolve_fails_without_client_credentials() {
        let err = resolve(RawConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar { .. }));
    }

    #[test]
    fn resolve_applies_defaults_when_file_supplies_client() {
        let config = resolve(raw_with_client()).unwrap();
        assert_eq!(config.catalog_path, PathBuf::from(DEFAULT_CATALOG_PATH));
        assert_eq!(config.hash_concurrency, DEFAULT_HASH_CONCURRENCY);
        assert_eq!(config.client.url, "http://localhost:8080");
    }

    #[test]
    fn load_reads_file_and_resolves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silo.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "catalog_path = \"/data/silo.db\"\nseeding_domain_roots = [\"/warm/seeding\"]\npool_payload_root_template = \"/cold/data/{{payload_hash}}\"\n\n[client]\nurl = \"http://localhost:8080\"\nusername = \"admin\"\npassword = \"hunter2\"\n"
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.catalog_path, PathBuf::from("/data/silo.db"));
        assert_eq!(config.seeding_domain_roots, vec![PathBuf::from("/warm/seeding")]);
    }

    #[test]
    fn load_errors_on_missing_explicit_path() {
        let err = load(Some(Path::new("/nonexistent/silo.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
