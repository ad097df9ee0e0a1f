use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A remotely-listed title as returned by the catalog's item list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub platform_fs_slug: String,
    pub fs_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_cover: Option<String>,
    #[serde(default)]
    pub fs_size_bytes: u64,
}

impl CatalogItem {
    /// Name shown in listings: `"<name> (<platform slug>)"`.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.platform_fs_slug)
    }

    /// Human-readable payload size, in GB from 1 GiB upwards, MB below.
    pub fn size_label(&self) -> String {
        let bytes = self.fs_size_bytes as f64;
        if bytes >= GIB {
            format!("{:.2} GB", bytes / GIB)
        } else {
            format!("{:.1} MB", bytes / MIB)
        }
    }

    /// Cover URL, treating an empty string as absent.
    pub fn cover_url(&self) -> Option<&str> {
        self.url_cover.as_deref().filter(|url| !url.is_empty())
    }
}

/// One item submitted to the transfer engine. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Catalog identifier of the remote item.
    pub remote_id: u64,
    /// Remote payload file name (`fs_name` in the catalog).
    pub payload_name: String,
    /// Name used in status messages and logs.
    pub display_name: String,
    /// Local file the payload is streamed into.
    pub destination: PathBuf,
    /// Size advertised by the catalog listing, if any.
    pub size_hint: Option<u64>,
}

impl TransferRequest {
    /// Builds a request for a catalog item streamed into `destination`.
    pub fn for_item(item: &CatalogItem, destination: PathBuf) -> Self {
        Self {
            remote_id: item.id,
            payload_name: item.fs_name.clone(),
            display_name: item.name.clone(),
            destination,
            size_hint: (item.fs_size_bytes > 0).then_some(item.fs_size_bytes),
        }
    }
}

/// Snapshot emitted after every chunk of a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    /// 0–100, or -1 when the server did not announce a length.
    pub percentage: i32,
    /// Bytes written to the destination so far.
    pub transferred: u64,
    /// Average rate since the transfer started.
    pub bytes_per_second: f64,
    /// Estimated time remaining; `None` when it cannot be derived.
    pub remaining: Option<Duration>,
    pub status: String,
}
