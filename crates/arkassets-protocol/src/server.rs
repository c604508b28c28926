//! Game server variants and their CDN endpoints

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HYPERGRYPH_CDN: &str = "https://ak.hycdn.cn/assetbundle";
const YOSTAR_US_CDN: &str = "https://ark-us-static-online.yo-star.com/assetbundle";
const YOSTAR_JP_CDN: &str = "https://ark-jp-static-online.yo-star.com/assetbundle";
const YOSTAR_KR_CDN: &str = "https://ark-kr-static-online-1300509597.yo-star.com/assetbundle";
const GRYPHLINE_TW_CDN: &str = "https://ak-tw.hg-cdn.com/assetbundle";

/// Game server a resource set is published for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Server {
    Official,
    Bilibili,
    En,
    Jp,
    Kr,
    Tw,
}

impl Server {
    /// All variants, in display order
    pub const ALL: [Self; 6] = [
        Self::Official,
        Self::Bilibili,
        Self::En,
        Self::Jp,
        Self::Kr,
        Self::Tw,
    ];

    /// Short name used in cache file names
    pub fn cache_name(self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Bilibili => "bilibili",
            Self::En => "en",
            Self::Jp => "jp",
            Self::Kr => "kr",
            Self::Tw => "tw",
        }
    }

    /// Human readable label
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Official => "CN Official",
            Self::Bilibili => "CN Bilibili",
            Self::En => "Global (EN)",
            Self::Jp => "Japan",
            Self::Kr => "Korea",
            Self::Tw => "Taiwan",
        }
    }

    /// Production endpoints for this server
    pub fn endpoints(self) -> ServerEndpoints {
        let (cdn_base, asset_tag) = match self {
            Self::Official => (HYPERGRYPH_CDN, "official"),
            Self::Bilibili => (HYPERGRYPH_CDN, "bilibili"),
            Self::En => (YOSTAR_US_CDN, "official"),
            Self::Jp => (YOSTAR_JP_CDN, "official"),
            Self::Kr => (YOSTAR_KR_CDN, "official"),
            Self::Tw => (GRYPHLINE_TW_CDN, "official"),
        };

        let version_url = match self {
            Self::Official => {
                "https://ak-conf.hypergryph.com/config/prod/official/Android/version".to_string()
            }
            Self::Bilibili => {
                "https://ak-conf.hypergryph.com/config/prod/b/Android/version".to_string()
            }
            Self::Tw => {
                "https://ak-conf-tw.gryphline.com/config/prod/official/Android/version".to_string()
            }
            Self::En | Self::Jp | Self::Kr => format!("{cdn_base}/{asset_tag}/Android/version"),
        };

        ServerEndpoints {
            cdn_base: cdn_base.to_string(),
            asset_tag: asset_tag.to_string(),
            version_url,
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_name())
    }
}

impl FromStr for Server {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "official" | "cn" => Ok(Self::Official),
            "bilibili" | "bili" | "b" => Ok(Self::Bilibili),
            "en" | "global" | "us" => Ok(Self::En),
            "jp" | "japan" => Ok(Self::Jp),
            "kr" | "korea" => Ok(Self::Kr),
            "tw" | "taiwan" => Ok(Self::Tw),
            other => Err(format!(
                "unknown server '{other}', expected one of: official, bilibili, en, jp, kr, tw"
            )),
        }
    }
}

/// Where a server's version descriptor, manifest and assets are fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoints {
    /// CDN root, without trailing slash
    pub cdn_base: String,

    /// Path segment selecting the distribution channel
    pub asset_tag: String,

    /// Version descriptor URL
    pub version_url: String,
}

impl ServerEndpoints {
    /// Endpoints rooted at an arbitrary base URL, laid out like the Yostar CDNs
    pub fn custom(cdn_base: &str, asset_tag: &str) -> Self {
        let cdn_base = cdn_base.trim_end_matches('/').to_string();
        Self {
            version_url: format!("{cdn_base}/{asset_tag}/Android/version"),
            cdn_base,
            asset_tag: asset_tag.to_string(),
        }
    }

    /// Directory holding the manifest and assets of one resource version
    pub fn assets_base(&self, res_version: &str) -> String {
        format!(
            "{}/{}/Android/assets/{}",
            self.cdn_base, self.asset_tag, res_version
        )
    }

    /// Hot-update manifest URL for `res_version`
    pub fn hot_update_list_url(&self, res_version: &str) -> String {
        format!("{}/hot_update_list.json", self.assets_base(res_version))
    }
}
