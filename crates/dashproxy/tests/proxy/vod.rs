use std::{num::NonZeroUsize, time::Duration};

use dashproxy::{mpd::Document, HttpClient};
use wiremock::{
    matchers::{header, header_regex, method, path},
    Mock, ResponseTemplate,
};

use super::*;
use crate::AssertWrapper;

#[tokio::test]
async fn test_vod_mirror() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(&server, mpd_response(VOD_MPD), None).await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path()).build(&mpd_url)?;
    proxy.run().await.assert_success();

    assert_eq!(proxy.refresh_count(), 1);
    assert_eq!(proxy.downloaders().len(), 1);

    // raw manifest is kept as fetched
    assert_eq!(read(dir.path(), "manifest.1.mpd")?, VOD_MPD);
    assert!(!dir.path().join("manifest.1.expanded.mpd").exists());

    for file in ["init.mp4", "0.m4s", "1000.m4s", "2000.m4s", "3000.m4s"] {
        assert_eq!(read(dir.path(), &format!("v1/{file}"))?, format!("/v1/{file}"));
    }

    let stats = proxy.stats();
    assert_eq!(stats.requested(), 5);
    assert_eq!(stats.downloaded(), 5);
    assert_eq!(stats.failed(), 0);

    let mpd = Document::parse(&read(dir.path(), "manifest.mpd")?)?;
    assert_eq!(
        timeline_starts(&mpd, &[("AdaptationSet", 0)]),
        vec![0, 1000, 2000, 3000]
    );

    Ok(())
}

#[tokio::test]
async fn test_segment_not_found() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(&server, mpd_response(VOD_MPD), None).await;
    Mock::given(method("GET"))
        .and(path("/v1/1000.m4s"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path()).build(&mpd_url)?;
    proxy.run().await.assert_success();

    assert_eq!(proxy.stats().failed(), 1);
    assert_eq!(proxy.stats().downloaded(), 4);
    assert!(!dir.path().join("v1/1000.m4s").exists());
    assert!(dir.path().join("v1/2000.m4s").exists());
    assert!(dir.path().join("manifest.mpd").exists());

    Ok(())
}

#[tokio::test]
async fn test_manifest_retry() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(&server, ResponseTemplate::new(500), Some(1)).await;
    mount_manifest(&server, mpd_response(VOD_MPD), None).await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path()).build(&mpd_url)?;
    proxy.run().await.assert_success();

    assert_eq!(proxy.refresh_count(), 2);
    assert!(!dir.path().join("manifest.1.mpd").exists());
    assert!(dir.path().join("manifest.2.mpd").exists());
    assert!(dir.path().join("v1/3000.m4s").exists());

    Ok(())
}

#[tokio::test]
async fn test_unexpected_document_is_retried() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(
        &server,
        ResponseTemplate::new(200).set_body_string("<html><body>busy</body></html>"),
        Some(1),
    )
    .await;
    mount_manifest(&server, mpd_response(VOD_MPD), None).await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path()).build(&mpd_url)?;
    proxy.run().await.assert_success();

    assert_eq!(proxy.refresh_count(), 2);
    assert!(dir.path().join("manifest.mpd").exists());

    Ok(())
}

#[tokio::test]
async fn test_save_individual_mpds() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(&server, mpd_response(VOD_MPD), None).await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path())
        .save_individual_mpds(true)
        .build(&mpd_url)?;
    proxy.run().await.assert_success();

    assert_eq!(read(dir.path(), "manifest.1.mpd")?, VOD_MPD);
    assert_eq!(
        read(dir.path(), "manifest.1.expanded.mpd")?,
        read(dir.path(), "manifest.mpd")?
    );

    Ok(())
}

#[tokio::test]
async fn test_missing_period_is_fatal() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(
        &server,
        mpd_response(r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static"></MPD>"#),
        None,
    )
    .await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path()).build(&mpd_url)?;
    let err = proxy.run().await.unwrap_err();

    assert!(err.is_structural());
    assert_eq!(proxy.refresh_count(), 1);
    assert!(!dir.path().join("manifest.mpd").exists());

    Ok(())
}

#[tokio::test]
async fn test_missing_segment_template_is_fatal() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    let body = r#"<MPD type="static"><Period><AdaptationSet><Representation id="v1"/></AdaptationSet></Period></MPD>"#;
    mount_manifest(&server, mpd_response(body), None).await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path()).build(&mpd_url)?;
    proxy.run().await.assert_error();
    assert_eq!(proxy.stats().requested(), 0);

    Ok(())
}

#[tokio::test]
async fn test_limited_concurrency() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(&server, mpd_response(VOD_MPD), None).await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path())
        .concurrency(NonZeroUsize::new(1).unwrap())
        .build(&mpd_url)?;
    proxy.run().await.assert_success();

    assert_eq!(proxy.stats().downloaded(), 5);

    Ok(())
}

#[tokio::test]
async fn test_manifest_request_headers() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .and(header_regex("accept", r"application/dash\+xml"))
        .and(header("cookie", "session=abc"))
        .respond_with(mpd_response(VOD_MPD))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir()?;

    let client = HttpClient::new(reqwest::Client::builder())?;
    client.add_cookies(vec!["session=abc".to_string()], &mpd_url.parse()?);

    let mut proxy = builder(dir.path()).client(client).build(&mpd_url)?;
    tokio::time::timeout(Duration::from_secs(5), proxy.run()).await??;

    assert_eq!(proxy.refresh_count(), 1);
    assert!(dir.path().join("v1/init.mp4").exists());

    Ok(())
}

#[tokio::test]
async fn test_period_base_url_is_local_only() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    let body = VOD_MPD.replace(
        r#"<Period id="0">"#,
        r#"<Period id="0"><BaseURL>sub/</BaseURL>"#,
    );
    mount_manifest(&server, mpd_response(body), None).await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path()).build(&mpd_url)?;
    proxy.run().await.assert_success();

    // fetched from the manifest base, stored below the period BaseURL
    assert_eq!(read(dir.path(), "sub/v1/0.m4s")?, "/v1/0.m4s");
    assert_eq!(read(dir.path(), "sub/v1/init.mp4")?, "/v1/init.mp4");
    assert!(!dir.path().join("v1").exists());
    assert_eq!(proxy.stats().failed(), 0);

    Ok(())
}
