//! Session-cookie-authenticated client for a qBittorrent-WebUI-shaped API.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::{ClientError, ClientResult};
use crate::model::{TorrentFile, TorrentSummary};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_RETRIES: u32 = 3;

/// Compute an exponential backoff delay for the given retry attempt,
/// clamped to a sane range.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let capped = attempt.min(5);
    let delay_ms = 250u64.saturating_mul(2u64.saturating_pow(capped));
    Duration::from_millis(delay_ms.clamp(250, 8_000))
}

/// Authenticated client for the torrent client's WebUI-shaped HTTP API.
#[derive(Clone)]
pub struct TorrentClient {
    http: Client,
    base_url: String,
}

impl TorrentClient {
    /// Construct a client and establish a session against the torrent
    /// client's WebUI API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built, the login
    /// request fails, or the client rejects the credentials.
    #[instrument(name = "torrent_client.connect", skip(password))]
    pub async fn connect(base_url: &str, username: &str, password: &str) -> ClientResult<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|source| ClientError::Request {
                operation: "build_client",
                source,
            })?;

        let client = Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        };
        client.login(username, password).await?;
        Ok(client)
    }

    /// Build a client from an already-authenticated HTTP client (tests only
    /// need this to point at a mock server without a real login).
    #[cfg(test)]
    fn from_parts(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn login(&self, username: &str, password: &str) -> ClientResult<()> {
        let url = format!("{}/api/v2/auth/login", self.base_url);
        let response = self
            .with_retry("login", || {
                self.http
                    .post(&url)
                    .form(&[("username", username), ("password", password)])
                    .send()
            })
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status != StatusCode::OK || body.trim() != "Ok." {
            return Err(ClientError::Login {
                reason: if body.trim().is_empty() {
                    format!("unexpected status {status}")
                } else {
                    body.trim().to_string()
                },
            });
        }
        Ok(())
    }

    /// List every torrent known to the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be
    /// decoded.
    #[instrument(name = "torrent_client.list_torrents", skip(self))]
    pub async fn list_torrents(&self) -> ClientResult<Vec<TorrentSummary>> {
        let url = format!("{}/api/v2/torrents/info", self.base_url);
        let response = self
            .with_retry("list_torrents", || self.http.get(&url).send())
            .await?;
        decode_response("list_torrents", response).await
    }

    /// List the files within a torrent's payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the torrent is unknown, or
    /// the response cannot be decoded.
    #[instrument(name = "torrent_client.torrent_files", skip(self))]
    pub async fn torrent_files(&self, infohash: &str) -> ClientResult<Vec<TorrentFile>> {
        let url = format!("{}/api/v2/torrents/files", self.base_url);
        let response = self
            .with_retry("torrent_files", || {
                self.http.get(&url).query(&[("hash", infohash)]).send()
            })
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                infohash: infohash.to_string(),
            });
        }
        decode_response("torrent_files", response).await
    }

    /// Pause a single torrent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the client rejects it.
    #[instrument(name = "torrent_client.pause", skip(self))]
    pub async fn pause(&self, infohash: &str) -> ClientResult<()> {
        self.post_hashes_action("pause", "/api/v2/torrents/pause", infohash, &[])
            .await
    }

    /// Resume a single torrent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the client rejects it.
    #[instrument(name = "torrent_client.resume", skip(self))]
    pub async fn resume(&self, infohash: &str) -> ClientResult<()> {
        self.post_hashes_action("resume", "/api/v2/torrents/resume", infohash, &[])
            .await
    }

    /// Set a torrent's content location to an absolute path.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the client rejects the new
    /// location.
    #[instrument(name = "torrent_client.set_location", skip(self))]
    pub async fn set_location(&self, infohash: &str, location: &str) -> ClientResult<()> {
        self.post_hashes_action(
            "set_location",
            "/api/v2/torrents/setLocation",
            infohash,
            &[("location", location)],
        )
        .await
    }

    async fn post_hashes_action(
        &self,
        operation: &'static str,
        path: &str,
        infohash: &str,
        extra_form: &[(&str, &str)],
    ) -> ClientResult<()> {
        let url = format!("{}{}", self.base_url, path);
        let mut form: Vec<(&str, &str)> = vec![("hashes", infohash)];
        form.extend_from_slice(extra_form);

        let response = self
            .with_retry(operation, || self.http.post(&url).form(&form).send())
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::UnexpectedStatus {
                operation,
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        Ok(())
    }

    async fn with_retry<F, Fut>(
        &self,
        operation: &'static str,
        request: F,
    ) -> ClientResult<reqwest::Response>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        loop {
            match request().await {
                Ok(response) => return Ok(response),
                Err(source) if attempt < MAX_RETRIES && is_retryable(&source) => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %source,
                        "retrying torrent client request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    debug!(operation, error = %source, "torrent client request failed");
                    return Err(ClientError::Request { operation, source });
                }
            }
        }
    }
}

fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    response: reqwest::Response,
) -> ClientResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::UnexpectedStatus {
            operation,
            status: status.as_u16(),
            body: truncate(&body),
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|source| ClientError::Decode { operation, source })
}

fn truncate(body: &str) -> String {
    const MAX_LEN: usize = 200;
    if body.len() > MAX_LEN {
        format!("{}...", &body[..MAX_LEN])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn backoff_delay_grows_and_clamps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(250));
        assert_eq!(backoff_delay(2), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(10), Duration::from_millis(8_000));
    }

    #[tokio::test]
    async fn list_torrents_decodes_json_array() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/torrents/info");
                then.status(200).json_body(serde_json::json!([
                    {
                        "hash": "abc123",
                        "name": "demo",
                        "save_path": "/warm/seeding",
                        "content_path": "/warm/seeding/demo",
                        "category": "movies",
                        "tags": "a, b"
                    }
                ]));
            })
            .await;

        let client = TorrentClient::from_parts(Client::new(), &server.base_url());
        let torrents = client.list_torrents().await.unwrap();
        mock.assert_async().await;

        assert_eq!(torrents.len(), 1);
        assert_eq!(torrents[0].hash, "abc123");
        assert_eq!(torrents[0].tag_list(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(torrents[0].content_root(), "/warm/seeding/demo");
    }

    #[tokio::test]
    async fn pause_propagates_non_success_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/torrents/pause");
                then.status(403).body("Forbidden");
            })
            .await;

        let client = TorrentClient::from_parts(Client::new(), &server.base_url());
        let err = client.pause("abc123").await.unwrap_err();
        mock.assert_async().await;

        assert!(matches!(err, ClientError::UnexpectedStatus { status: 403, .. }));
    }

    #[tokio::test]
    async fn torrent_files_not_found_maps_to_not_found_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/torrents/files");
                then.status(404);
            })
            .await;

        let client = TorrentClient::from_parts(Client::new(), &server.base_url());
        let err = client.torrent_files("missing").await.unwrap_err();
        mock.assert_async().await;

        assert!(matches!(err, ClientError::NotFound { .. }));
    }
}
