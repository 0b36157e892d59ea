use std::time::Duration;

use dashproxy::mpd::{Document, RepresentationAddress};
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{method, path_regex},
    Mock,
};

use super::*;
use crate::AssertWrapper;

#[tokio::test]
async fn test_live_until_ended() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(&server, mpd_response(LIVE_MPD), Some(2)).await;
    mount_manifest(&server, mpd_response(ended(LIVE_MPD)), None).await;
    // one initialization segment per representation, whatever the number of refreshes
    Mock::given(method("GET"))
        .and(path_regex(r"/init\.mp4$"))
        .respond_with(EchoPath)
        .expect(3)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path()).build(&mpd_url)?;
    proxy.run().await.assert_success();

    assert_eq!(proxy.refresh_count(), 3);
    assert_eq!(proxy.downloaders().len(), 3);
    for address in [
        RepresentationAddress::new(0, 0, 0),
        RepresentationAddress::new(0, 0, 1),
        RepresentationAddress::new(0, 1, 0),
    ] {
        let downloader = proxy.downloaders().get(&address).unwrap();
        assert_eq!(downloader.refreshes(), 3);
        assert!(downloader.initialization_downloaded());
    }

    // 9 segments on every refresh, plus 3 initialization segments
    assert_eq!(proxy.stats().requested(), 30);
    assert_eq!(proxy.stats().downloaded(), 30);

    for refresh in 1..=3 {
        assert!(dir.path().join(format!("manifest.{refresh}.mpd")).exists());
    }
    assert_eq!(read(dir.path(), "manifest.3.mpd")?, ended(LIVE_MPD));

    for representation in ["v720", "v360"] {
        for file in ["init.mp4", "90000.m4s", "270000.m4s", "450000.m4s"] {
            let requested = format!("/{representation}/{file}");
            assert_eq!(read(dir.path(), &format!("dash{requested}"))?, requested);
        }
    }
    for file in ["init.mp4", "00010.m4s", "00011.m4s", "00012.m4s"] {
        let requested = format!("/audio/{file}");
        assert_eq!(read(dir.path(), &format!("dash{requested}"))?, requested);
    }

    Ok(())
}

#[tokio::test]
async fn test_live_manifest_rewrite() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(&server, mpd_response(LIVE_MPD), Some(1)).await;
    mount_manifest(&server, mpd_response(ended(LIVE_MPD)), None).await;
    let dir = tempfile::tempdir()?;

    let mut proxy = builder(dir.path()).build(&mpd_url)?;
    proxy.run().await.assert_success();

    let mpd = Document::parse(&read(dir.path(), "manifest.mpd")?)?;
    let root = mpd.root();
    assert!(!mpd.attributes(root).contains("minimumUpdatePeriod"));

    let period = mpd.find(root, "Period").unwrap();
    let base_url = mpd.find(period, "BaseURL").unwrap();
    assert_eq!(mpd.text(base_url), Some("dash/"));

    assert_eq!(
        timeline_starts(&mpd, &[("AdaptationSet", 0)]),
        vec![90000, 270000, 450000]
    );
    assert_eq!(
        timeline_starts(&mpd, &[("AdaptationSet", 1), ("Representation", 0)]),
        vec![0, 96000, 192000]
    );

    Ok(())
}

#[tokio::test]
async fn test_shutdown_stops_refreshing() -> anyhow::Result<()> {
    let (mpd_url, server) = setup_mock_server().await;
    mount_manifest(&server, mpd_response(LIVE_MPD), None).await;
    let dir = tempfile::tempdir()?;

    let shutdown = CancellationToken::new();
    let mut proxy = builder(dir.path())
        .shutdown(shutdown.clone())
        .build(&mpd_url)?;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();
    });
    tokio::time::timeout(Duration::from_secs(5), proxy.run()).await??;

    assert!(proxy.refresh_count() >= 2);
    assert_eq!(proxy.downloaders().len(), 3);
    assert_eq!(proxy.stats().requested(), proxy.stats().downloaded());
    assert!(read(dir.path(), "manifest.mpd")?.contains("minimumUpdatePeriod"));

    Ok(())
}

#[tokio::test]
async fn test_cancelled_before_first_refresh() -> anyhow::Result<()> {
    let (mpd_url, _server) = setup_mock_server().await;
    let dir = tempfile::tempdir()?;

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let mut proxy = builder(dir.path()).shutdown(shutdown).build(&mpd_url)?;
    proxy.run().await.assert_success();

    assert_eq!(proxy.refresh_count(), 0);
    assert!(!dir.path().join("manifest.mpd").exists());

    Ok(())
}
