//! Mapping from manifest paths to CDN download URLs

use std::path::Path;

use crate::server::ServerEndpoints;

/// Remote file name for a manifest path.
///
/// The extension of the final component becomes `dat`, directory separators
/// become `_` and the first `#` becomes `__`: `arts/skin#1.ab` is served as
/// `arts_skin__1.dat`. A final component without a dot keeps its name.
pub fn remote_name(relative_path: &str) -> String {
    let file_start = relative_path.rfind('/').map_or(0, |i| i + 1);
    let name = match relative_path[file_start..].rfind('.') {
        Some(dot) => format!("{}.dat", &relative_path[..file_start + dot]),
        None => relative_path.to_string(),
    };
    name.replace('/', "_").replacen('#', "__", 1)
}

/// Download URL of `relative_path` for one resource version
pub fn asset_url(endpoints: &ServerEndpoints, res_version: &str, relative_path: &str) -> String {
    format!(
        "{}/{}",
        endpoints.assets_base(res_version),
        remote_name(relative_path)
    )
}

/// Whether a file is a bundle that should be decoded and extracted
pub fn is_bundle_path(relative_path: &str) -> bool {
    Path::new(relative_path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ab"))
}
