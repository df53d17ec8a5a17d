//! Wire-format DTOs for the torrent client's WebUI-shaped API.

use serde::{Deserialize, Serialize};

/// A torrent as reported by the client's list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentSummary {
    /// Infohash reported by the client.
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Save path (parent directory of the torrent's content).
    pub save_path: String,
    /// Resolved content path, when the client tracks one separately from
    /// `save_path`.
    pub content_path: Option<String>,
    /// Category assigned in the client, if any.
    pub category: Option<String>,
    /// Comma-separated tag list, as returned by the wire API.
    #[serde(default)]
    pub tags: String,
}

impl TorrentSummary {
    /// Split the wire-format comma-separated tag string into individual
    /// tags, trimming whitespace and dropping empty entries.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Resolved content root: `content_path` when present, otherwise
    /// `save_path` joined with `name`.
    #[must_use]
    pub fn content_root(&self) -> String {
        match &self.content_path {
            Some(path) if !path.is_empty() => path.clone(),
            _ => format!("{}/{}", self.save_path.trim_end_matches('/'), self.name),
        }
    }
}

/// A single file within a torrent's payload, as reported by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Path relative to the torrent's content root.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}
