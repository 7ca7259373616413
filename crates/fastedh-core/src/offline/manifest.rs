//! Precache manifest of one deployed build.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::DEFAULT_BASE_PATH;
use crate::error::TrackerError;

/// Prefix of every cache region name
pub const CACHE_PREFIX: &str = "cache-";

/// File name of the offline fallback page under the base path
pub const OFFLINE_PAGE: &str = "offline.html";

/// Placeholder origin used to percent-encode asset paths
const ENCODING_BASE: &str = "http://assets.invalid/";

/// Raw manifest as emitted by the build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ManifestFile {
    version: String,
    base_path: Option<String>,
    build: Vec<String>,
    files: Vec<String>,
    prerendered: Vec<String>,
}

/// Assets that must be cached before a version may serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    version: String,
    base_path: String,
    assets: BTreeSet<String>,
}

impl AssetManifest {
    /// Start a manifest for `version`; the app root is always included.
    pub fn new(version: impl Into<String>, base_path: impl Into<String>) -> Self {
        let base_path = normalize_base_path(&base_path.into());
        let mut assets = BTreeSet::new();
        assets.insert(encode_asset_path(&format!("{}/", base_path)));
        Self {
            version: version.into(),
            base_path,
            assets,
        }
    }

    /// Bundle files produced by the build.
    pub fn with_build<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_assets(paths)
    }

    /// Static files copied verbatim.
    pub fn with_files<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_assets(paths)
    }

    /// Pre-rendered page paths.
    pub fn with_prerendered<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_assets(paths)
    }

    fn with_assets<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assets.extend(
            paths
                .into_iter()
                .map(Into::into)
                .filter(|path| !path.trim().is_empty())
                .map(|path| encode_asset_path(&path)),
        );
        self
    }

    /// Parse a manifest from JSON.
    ///
    /// ```json
    /// { "version": "1718", "build": ["/fast-edh/_app/start.js"], "files": [], "prerendered": [] }
    /// ```
    pub fn from_json(raw: &str) -> Result<Self, TrackerError> {
        let file: ManifestFile = serde_json::from_str(raw)?;
        if file.version.trim().is_empty() {
            return Err(TrackerError::Config("manifest version is empty".to_string()));
        }
        let base_path = file
            .base_path
            .unwrap_or_else(|| DEFAULT_BASE_PATH.to_string());
        Ok(Self::new(file.version, base_path)
            .with_build(file.build)
            .with_files(file.files)
            .with_prerendered(file.prerendered))
    }

    /// Read and parse a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Name of the cache region owned by this version.
    pub fn cache_name(&self) -> String {
        format!("{}{}", CACHE_PREFIX, self.version)
    }

    /// Path of the application root, e.g. `/fast-edh/`.
    pub fn root_path(&self) -> String {
        format!("{}/", self.base_path)
    }

    pub fn offline_page_path(&self) -> String {
        format!("{}/{}", self.base_path, OFFLINE_PAGE)
    }

    /// Whether `path` is a precached asset. Raw and percent-encoded forms
    /// of the same path match.
    pub fn contains(&self, path: &str) -> bool {
        self.assets.contains(&encode_asset_path(path))
    }

    /// Asset paths in sorted order.
    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Absolute paths are stored in the encoded form `Url::path` reports, so
/// lookups by request path match. Relative paths are kept as written.
fn encode_asset_path(path: &str) -> String {
    if !path.starts_with('/') {
        return path.to_string();
    }
    Url::parse(ENCODING_BASE)
        .and_then(|base| base.join(path))
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| path.to_string())
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
