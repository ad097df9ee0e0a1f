use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::FolderError;

/// Read-only mapping from platform slug to folder name.
///
/// Keys are lower-cased at load time so lookups ignore case. Slugs without
/// an override resolve to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformFolderMap {
    folders: HashMap<String, String>,
}

impl PlatformFolderMap {
    /// Builds a map from explicit `(slug, folder)` pairs.
    pub fn from_mappings<I, K, V>(mappings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let folders = mappings
            .into_iter()
            .map(|(slug, folder)| (slug.as_ref().to_lowercase(), folder.into()))
            .collect();
        Self { folders }
    }

    /// Parses a JSON object of `"slug": "folder"` pairs.
    pub fn try_load(path: &Path) -> Result<Self, FolderError> {
        let data = std::fs::read_to_string(path)?;
        let raw: HashMap<String, String> = serde_json::from_str(&data)?;
        Ok(Self::from_mappings(raw))
    }

    /// Loads the override file, falling back to an empty map when it is
    /// missing, unreadable or malformed.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(map) => {
                info!(path = %path.display(), mappings = map.len(), "platform folders loaded");
                map
            }
            Err(FolderError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no platform folder overrides");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring platform folder file");
                Self::default()
            }
        }
    }

    /// Like [`load`](Self::load), but first copies `template` into place
    /// when the override file does not exist yet.
    pub fn load_with_template(path: &Path, template: &Path) -> Self {
        if !path.exists() && template.is_file() {
            match std::fs::copy(template, path) {
                Ok(_) => info!(
                    template = %template.display(),
                    path = %path.display(),
                    "platform folder file created from template"
                ),
                Err(e) => warn!(
                    template = %template.display(),
                    error = %e,
                    "failed to copy platform folder template"
                ),
            }
        }
        Self::load(path)
    }

    /// Folder for `slug`, or `slug` itself when there is no override.
    pub fn resolve<'a>(&'a self, slug: &'a str) -> &'a str {
        self.folders
            .get(&slug.to_lowercase())
            .map(String::as_str)
            .unwrap_or(slug)
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}
