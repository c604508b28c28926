//! End to end pipeline runs against a mock CDN

#![allow(clippy::expect_used, clippy::unwrap_used)]

use arkassets_formats::bundle::{BundleBuilder, CompressionKind};
use arkassets_protocol::{
    ManifestFetchError, Pipeline, PipelineConfig, PipelineError, ResumeStore, RetryPolicy,
    ServerEndpoints, UpdateStatus,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RES_VERSION: &str = "24-05-01-10-00-00-a1b2c3";
const CLIENT_VERSION: &str = "2.2.41";

fn init_crypto() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn asset_route(remote: &str) -> String {
    format!("/official/Android/assets/{RES_VERSION}/{remote}")
}

fn config(server: &MockServer, save_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        endpoints: Some(ServerEndpoints::custom(&server.uri(), "official")),
        save_dir: save_dir.to_path_buf(),
        threads: 2,
        retry: RetryPolicy::none(),
        ..PipelineConfig::default()
    }
}

fn tiny_png() -> Vec<u8> {
    let mut v = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    v.extend_from_slice(&[0, 0, 0, 13]);
    v.extend_from_slice(b"IHDR");
    v.extend_from_slice(&[0x01; 17]);
    v.extend_from_slice(&[0, 0, 0, 0]);
    v.extend_from_slice(b"IEND");
    v.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
    v
}

fn portrait_bundle() -> Vec<u8> {
    let mut block = vec![0x07; 100];
    block.extend_from_slice(&tiny_png());
    block.extend_from_slice(&[0x07; 40]);
    BundleBuilder::new()
        .add_block(&block, CompressionKind::Lz4)
        .build()
        .unwrap()
}

fn zipped(entry: &str, data: &[u8]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(&mut buf);
    writer
        .start_file(entry, zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap();
    buf.into_inner()
}

fn manifest(portrait_md5: &str) -> Value {
    json!({
        "fullPack": {"totalSize": 0, "abSize": 0, "type": "full"},
        "versionId": RES_VERSION,
        "packInfos": [
            {"name": "arts_charportraits", "totalSize": 1000},
            {"name": "gamedata_levels", "totalSize": 20}
        ],
        "abInfos": [
            {"name": "arts/charportraits/pack1.ab", "totalSize": 1000, "abSize": 600, "md5": portrait_md5, "pid": "arts_charportraits"},
            {"name": "gamedata/levels/obt/main/level_main_00-01.bytes", "totalSize": 20, "abSize": 30, "md5": "lv1", "pid": "gamedata_levels"},
            {"name": "audio/sound_beta_2/title.ab", "totalSize": 5, "abSize": 5, "md5": "snd", "pid": "audio_sound_beta_2"}
        ]
    })
}

async fn mount_metadata(server: &MockServer, list: Value) {
    Mock::given(method("GET"))
        .and(path("/official/Android/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resVersion": RES_VERSION,
            "clientVersion": CLIENT_VERSION
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(asset_route("hot_update_list.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(list))
        .mount(server)
        .await;
}

async fn mount_asset(server: &MockServer, remote: &str, body: Vec<u8>, expected: u64) {
    Mock::given(method("GET"))
        .and(path(asset_route(remote)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_all_assets(server: &MockServer, expected: u64) {
    mount_asset(
        server,
        "arts_charportraits_pack1.dat",
        portrait_bundle(),
        expected,
    )
    .await;
    mount_asset(
        server,
        "gamedata_levels_obt_main_level_main_00-01.dat",
        zipped(
            "gamedata/levels/obt/main/level_main_00-01.bytes",
            br#"{"options":{}}"#,
        ),
        expected,
    )
    .await;
    mount_asset(
        server,
        "audio_sound_beta_2_title.dat",
        b"plain audio stub".to_vec(),
        expected,
    )
    .await;
}

#[tokio::test]
async fn full_run_saves_records_and_unpacks() {
    init_crypto();
    let server = MockServer::start().await;
    mount_metadata(&server, manifest("p1")).await;
    mount_all_assets(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config(&server, dir.path())).unwrap();
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.status, UpdateStatus::FirstCheck);
    assert_eq!(report.declared_files, 3);
    assert_eq!(report.batch.scheduled, 3);
    assert_eq!(report.batch.succeeded, 3);
    assert!(report.is_success());
    assert_eq!(report.recorded, 3);

    let root = dir.path();
    assert!(root.join("persistent_res_list.json").exists());
    assert!(root.join("version_cache_en.json").exists());

    let portrait = root.join("arts/charportraits/pack1_unpacked/texture_0.png");
    assert_eq!(fs::read(portrait).unwrap(), tiny_png());

    // Zip payloads are extracted, non-bundles are not unpacked
    let level = root.join("gamedata/levels/obt/main/level_main_00-01.bytes");
    assert_eq!(fs::read(level).unwrap(), br#"{"options":{}}"#);
    assert!(!root.join("gamedata/levels/obt/main/level_main_00-01_unpacked").exists());

    let snapshot = pipeline.progress().snapshot();
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.total, 3);
}

#[tokio::test]
async fn second_run_downloads_nothing() {
    init_crypto();
    let server = MockServer::start().await;
    mount_metadata(&server, manifest("p1")).await;
    mount_all_assets(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let first = Pipeline::new(config(&server, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.batch.succeeded, 3);

    let second = Pipeline::new(config(&server, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.status, UpdateStatus::NoUpdate);
    assert_eq!(second.batch.scheduled, 0);
    assert_eq!(second.up_to_date, 3);
}

#[tokio::test]
async fn changed_checksum_replaces_stale_output() {
    init_crypto();
    let server = MockServer::start().await;
    mount_metadata(&server, manifest("p1")).await;
    mount_all_assets(&server, 1).await;

    let dir = TempDir::new().unwrap();
    Pipeline::new(config(&server, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap();

    let unpacked = dir.path().join("arts/charportraits/pack1_unpacked");
    fs::write(unpacked.join("leftover.txt"), b"from the old bundle").unwrap();

    server.reset().await;
    mount_metadata(&server, manifest("p2")).await;
    mount_asset(
        &server,
        "arts_charportraits_pack1.dat",
        portrait_bundle(),
        1,
    )
    .await;

    let report = Pipeline::new(config(&server, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.invalidated, 1);
    assert_eq!(report.batch.scheduled, 1);
    assert_eq!(report.batch.succeeded, 1);

    assert!(!unpacked.join("leftover.txt").exists());
    assert!(unpacked.join("texture_0.png").exists());

    let store = ResumeStore::load(dir.path()).unwrap();
    assert_eq!(store.checksum("arts/charportraits/pack1.ab").as_deref(), Some("p2"));
}

#[tokio::test]
async fn failing_file_does_not_stop_the_batch() {
    init_crypto();
    let server = MockServer::start().await;

    let ab_infos: Vec<Value> = (0..5)
        .map(|i| json!({"name": format!("spritepack/icon_{i}.ab"), "totalSize": 10, "abSize": 10, "md5": format!("m{i}")}))
        .collect();
    mount_metadata(&server, json!({"packInfos": [], "abInfos": ab_infos})).await;

    for i in 0..5 {
        let remote = format!("spritepack_icon_{i}.dat");
        if i == 2 {
            Mock::given(method("GET"))
                .and(path(asset_route(&remote)))
                .respond_with(ResponseTemplate::new(500))
                .expect(1)
                .mount(&server)
                .await;
        } else {
            mount_asset(&server, &remote, vec![0u8; 32], 1).await;
        }
    }

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config(&server, dir.path())).unwrap();
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.batch.scheduled, 5);
    assert_eq!(report.batch.succeeded, 4);
    assert_eq!(report.batch.failed.len(), 1);
    assert_eq!(report.batch.failed[0].0, "spritepack/icon_2.ab");
    assert_eq!(report.recorded, 4);

    let snapshot = pipeline.progress().snapshot();
    assert_eq!(
        (snapshot.total, snapshot.unzip, snapshot.unpack),
        (5, 5, 5)
    );

    let store = ResumeStore::load(dir.path()).unwrap();
    assert!(store.checksum("spritepack/icon_2.ab").is_none());
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn package_selection_limits_downloads() {
    init_crypto();
    let server = MockServer::start().await;
    mount_metadata(&server, manifest("p1")).await;
    mount_asset(
        &server,
        "gamedata_levels_obt_main_level_main_00-01.dat",
        b"{}".to_vec(),
        1,
    )
    .await;
    mount_asset(&server, "arts_charportraits_pack1.dat", Vec::new(), 0).await;
    mount_asset(&server, "audio_sound_beta_2_title.dat", Vec::new(), 0).await;

    let dir = TempDir::new().unwrap();
    let mut config = config(&server, dir.path());
    config.packages = Some(vec!["gamedata/levels".to_string(), "nonexistent".to_string()]);
    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.packages, vec!["gamedata/levels"]);
    assert_eq!(report.declared_files, 1);
    assert_eq!(report.batch.succeeded, 1);
}

#[tokio::test]
async fn unknown_packages_only_downloads_nothing() {
    init_crypto();
    let server = MockServer::start().await;
    mount_metadata(&server, manifest("p1")).await;
    mount_all_assets(&server, 0).await;

    let dir = TempDir::new().unwrap();
    let mut config = config(&server, dir.path());
    config.packages = Some(vec!["nonexistent".to_string()]);
    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    assert!(report.packages.is_empty());
    assert_eq!(report.batch.scheduled, 0);
}

#[tokio::test]
async fn manifest_failure_is_fatal() {
    init_crypto();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/official/Android/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resVersion": RES_VERSION,
            "clientVersion": CLIENT_VERSION
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(asset_route("hot_update_list.json")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = Pipeline::new(config(&server, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Manifest(ManifestFetchError::Status { status, .. }) if status.as_u16() == 503
    ));
    assert!(!dir.path().join("persistent_res_list.json").exists());
}

#[tokio::test]
async fn unreachable_version_endpoint_is_fatal() {
    init_crypto();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/official/Android/version"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = Pipeline::new(config(&server, dir.path()))
        .unwrap()
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Manifest(_)));
}
