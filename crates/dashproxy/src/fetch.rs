use std::{
    num::NonZeroUsize,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use url::Url;

use crate::{http::HttpClient, storage::OutputDir};

#[derive(Debug, Default)]
pub struct DownloadStats {
    requested: AtomicUsize,
    downloaded: AtomicUsize,
    failed: AtomicUsize,
}

impl DownloadStats {
    pub fn requested(&self) -> usize {
        self.requested.load(Ordering::Relaxed)
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Spawns file downloads into the output directory and keeps track of them.
///
/// Every download runs in its own task, so issuing one never waits for another to finish.
/// A failed download is logged and counted, and is not retried.
#[derive(Clone)]
pub struct Fetcher {
    client: HttpClient,
    output: OutputDir,
    tracker: TaskTracker,
    permits: Option<Arc<Semaphore>>,
    stats: Arc<DownloadStats>,
}

impl Fetcher {
    pub fn new(client: HttpClient, output: OutputDir, concurrency: Option<NonZeroUsize>) -> Self {
        Self {
            client,
            output,
            tracker: TaskTracker::new(),
            permits: concurrency.map(|c| Arc::new(Semaphore::new(c.get()))),
            stats: Arc::new(DownloadStats::default()),
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn output(&self) -> &OutputDir {
        &self.output
    }

    pub fn stats(&self) -> &DownloadStats {
        &self.stats
    }

    /// Download `url` into `path`, relative to the output directory.
    pub fn spawn(&self, url: Url, path: PathBuf) {
        self.stats.requested.fetch_add(1, Ordering::Relaxed);
        tracing::info!("requesting {}", path.display());

        let client = self.client.clone();
        let output = self.output.clone();
        let permits = self.permits.clone();
        let stats = self.stats.clone();
        self.tracker.spawn(async move {
            let _permit = match permits {
                Some(permits) => match permits.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            let bytes = match client.get_bytes(url.clone(), None).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!("cannot download {url}: {e}");
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            };

            match output.write(&path, &bytes).await {
                Ok(dest) => {
                    tracing::info!("{}: Write operation complete.", dest.display());
                    stats.downloaded.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::error!("{}: Error writing file: {e}", path.display());
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every spawned download has finished.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
