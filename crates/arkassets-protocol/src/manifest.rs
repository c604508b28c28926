//! Hot-update manifest resolution
//!
//! The manifest lists every downloadable file (`abInfos`) and the packages they
//! belong to (`packInfos`). Package names use `_` where the on-disk layout uses
//! `/`, so `gamedata_levels` is the package for files under `gamedata/levels`.
//! Files without a known package go into the synthetic `other` package.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::ManifestFetchError;
use crate::retry::RetryPolicy;
use crate::server::ServerEndpoints;
use crate::transport::HttpClient;
use crate::version::VersionInfo;

/// Package that collects files without a registered package
pub const OTHER_PACKAGE: &str = "other";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HotUpdateList {
    pack_infos: Vec<PackInfo>,
    ab_infos: Vec<AbInfo>,
}

#[derive(Debug, Deserialize)]
struct PackInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbInfo {
    name: String,
    total_size: u64,
    ab_size: u64,
    md5: String,
    pid: Option<String>,
}

/// One downloadable file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Size once unpacked
    pub total_size: u64,
    /// Transfer size
    pub compressed_size: u64,
    /// Content checksum used for change detection
    pub checksum: String,
}

/// Files of one package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Sum of `total_size` over the package's files
    pub total_size: u64,
    /// Relative path to file record
    pub files: BTreeMap<String, AssetRecord>,
}

/// Package to file index for one resource version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    /// Resource version the manifest describes
    pub res_version: String,
    /// Client version reported alongside it
    pub client_version: String,
    /// Package key to package
    pub packages: BTreeMap<String, PackageInfo>,
    /// Declared size of every file in the manifest
    pub total_size: u64,
    /// Transfer size of every file in the manifest
    pub compressed_size: u64,
}

/// Package key for a manifest package name
pub fn package_key(name: &str) -> String {
    name.replace('_', "/")
}

impl AssetManifest {
    fn build(version: &VersionInfo, list: HotUpdateList) -> Self {
        let mut packages: BTreeMap<String, PackageInfo> = BTreeMap::new();
        packages.insert(OTHER_PACKAGE.to_string(), PackageInfo::default());
        for pack in &list.pack_infos {
            packages.entry(package_key(&pack.name)).or_default();
        }

        let mut total_size = 0u64;
        let mut compressed_size = 0u64;

        for ab in list.ab_infos {
            total_size = total_size.saturating_add(ab.total_size);
            compressed_size = compressed_size.saturating_add(ab.ab_size);

            let key = ab
                .pid
                .as_deref()
                .map(package_key)
                .filter(|key| packages.contains_key(key))
                .unwrap_or_else(|| OTHER_PACKAGE.to_string());

            let package = packages.entry(key).or_default();
            package.total_size = package.total_size.saturating_add(ab.total_size);
            package.files.insert(
                ab.name,
                AssetRecord {
                    total_size: ab.total_size,
                    compressed_size: ab.ab_size,
                    checksum: ab.md5,
                },
            );
        }

        Self {
            res_version: version.res_version.clone(),
            client_version: version.client_version.clone(),
            packages,
            total_size,
            compressed_size,
        }
    }

    /// Number of files across all packages
    pub fn file_count(&self) -> usize {
        self.packages.values().map(|p| p.files.len()).sum()
    }

    /// Split `keys` into known package keys and unknown ones
    pub fn select<'a>(&self, keys: &'a [String]) -> (Vec<&'a str>, Vec<&'a str>) {
        keys.iter()
            .map(String::as_str)
            .partition(|key| self.packages.contains_key(*key))
    }

    /// Files of the given packages, keyed by relative path
    pub fn files_of<'a, I>(&self, keys: I) -> BTreeMap<String, AssetRecord>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .filter_map(|key| self.packages.get(key))
            .flat_map(|package| package.files.iter())
            .map(|(path, record)| (path.clone(), record.clone()))
            .collect()
    }

    /// Files of every package
    pub fn all_files(&self) -> BTreeMap<String, AssetRecord> {
        self.files_of(self.packages.keys().map(String::as_str))
    }
}

/// Result of a resolve: the manifest plus its declared totals
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    /// Package index
    pub manifest: AssetManifest,
    /// Declared size of every file
    pub total_size: u64,
    /// Transfer size of every file
    pub compressed_size: u64,
}

impl ResolvedManifest {
    fn new(manifest: AssetManifest) -> Self {
        Self {
            total_size: manifest.total_size,
            compressed_size: manifest.compressed_size,
            manifest,
        }
    }
}

/// Fetches the version descriptor and hot-update manifest of one server
#[derive(Clone)]
pub struct ManifestResolver {
    client: HttpClient,
    endpoints: ServerEndpoints,
    retry: RetryPolicy,
}

impl ManifestResolver {
    pub fn new(client: HttpClient, endpoints: ServerEndpoints, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoints,
            retry,
        }
    }

    /// Endpoints this resolver talks to
    pub fn endpoints(&self) -> &ServerEndpoints {
        &self.endpoints
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ManifestFetchError> {
        self.retry
            .execute(|| self.client.get_json::<T>(url))
            .await
            .map_err(|e| ManifestFetchError::from_protocol(url, e))
    }

    /// Fetch the current version descriptor
    pub async fn fetch_version(&self) -> Result<VersionInfo, ManifestFetchError> {
        let version: VersionInfo = self.get_json(&self.endpoints.version_url).await?;
        debug!(
            "Server reports resVersion {} clientVersion {}",
            version.res_version, version.client_version
        );
        Ok(version)
    }

    /// Fetch and index the manifest for an already known version
    pub async fn resolve_version(
        &self,
        version: &VersionInfo,
    ) -> Result<ResolvedManifest, ManifestFetchError> {
        let url = self.endpoints.hot_update_list_url(&version.res_version);
        let list: HotUpdateList = self.get_json(&url).await?;
        let manifest = AssetManifest::build(version, list);

        info!(
            "Found {} packages with {} total files",
            manifest.packages.len(),
            manifest.file_count()
        );
        Ok(ResolvedManifest::new(manifest))
    }

    /// Fetch the version descriptor, then the manifest it points to
    pub async fn resolve(&self) -> Result<ResolvedManifest, ManifestFetchError> {
        let version = self.fetch_version().await?;
        self.resolve_version(&version).await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn version() -> VersionInfo {
        VersionInfo {
            res_version: "r1".into(),
            client_version: "c1".into(),
        }
    }

    fn sample_list() -> HotUpdateList {
        serde_json::from_value(json!({
            "fullPack": {},
            "packInfos": [
                {"name": "gamedata_levels", "totalSize": 10},
                {"name": "arts_charportraits"}
            ],
            "abInfos": [
                {"name": "gamedata/levels/obt/main/level_main_00-01.ab", "totalSize": 100, "abSize": 40, "md5": "aa", "pid": "gamedata_levels"},
                {"name": "arts/charportraits/pack1.ab", "totalSize": 200, "abSize": 150, "md5": "bb", "pid": "arts_charportraits"},
                {"name": "audio/sound_beta_2/voice.ab", "totalSize": 7, "abSize": 5, "md5": "cc", "pid": "audio_unregistered"},
                {"name": "spritepack/ui_icons.ab", "totalSize": 3, "abSize": 2, "md5": "dd"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_package_attribution() {
        let manifest = AssetManifest::build(&version(), sample_list());

        let keys: Vec<_> = manifest.packages.keys().cloned().collect();
        assert_eq!(keys, vec!["arts/charportraits", "gamedata/levels", "other"]);

        let levels = &manifest.packages["gamedata/levels"];
        assert_eq!(levels.total_size, 100);
        assert_eq!(
            levels.files["gamedata/levels/obt/main/level_main_00-01.ab"],
            AssetRecord {
                total_size: 100,
                compressed_size: 40,
                checksum: "aa".into(),
            }
        );

        let other = &manifest.packages[OTHER_PACKAGE];
        assert_eq!(other.files.len(), 2);
        assert_eq!(other.total_size, 10);

        assert_eq!(manifest.total_size, 310);
        assert_eq!(manifest.compressed_size, 197);
        assert_eq!(manifest.file_count(), 4);
        assert_eq!(manifest.res_version, "r1");
    }

    #[test]
    fn test_other_always_registered() {
        let list: HotUpdateList =
            serde_json::from_value(json!({"packInfos": [], "abInfos": []})).unwrap();
        let manifest = AssetManifest::build(&version(), list);
        assert!(manifest.packages.contains_key(OTHER_PACKAGE));
        assert_eq!(manifest.file_count(), 0);
    }

    #[test]
    fn test_select_and_files_of() {
        let manifest = AssetManifest::build(&version(), sample_list());
        let keys = vec!["gamedata/levels".to_string(), "nope".to_string()];
        let (known, unknown) = manifest.select(&keys);
        assert_eq!(known, vec!["gamedata/levels"]);
        assert_eq!(unknown, vec!["nope"]);

        let files = manifest.files_of(known);
        assert_eq!(files.len(), 1);
        assert_eq!(manifest.all_files().len(), 4);
    }
}
