use std::{
    collections::{hash_map::Entry, HashMap},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    downloader::SegmentDownloader,
    error::{ProxyError, ProxyResult},
    fetch::{DownloadStats, Fetcher},
    http::HttpClient,
    mpd::{url::resolve_base_url, Document, RepresentationAddress},
    storage::OutputDir,
};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

const MPD_ACCEPT: &str = "application/dash+xml,video/vnd.mpeg.dash.mpd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// `MPD@minimumUpdatePeriod` is present, the manifest has to be fetched again.
    Live,
    /// Nothing more will be announced.
    OnDemand,
}

/// Keeps a local mirror of a DASH stream up to date.
///
/// Each refresh fetches the manifest, drives one [`SegmentDownloader`] per representation of
/// the first period and writes the rewritten manifest to `manifest.mpd`. Live manifests are
/// refreshed until the shutdown token is cancelled.
pub struct DashProxy {
    mpd_url: Url,
    client: HttpClient,
    output: OutputDir,
    fetcher: Fetcher,

    save_individual_mpds: bool,
    retry_interval: Duration,
    refresh_interval: Duration,
    shutdown: CancellationToken,

    refresh_count: u64,
    downloaders: HashMap<RepresentationAddress, SegmentDownloader>,
}

impl DashProxy {
    pub fn builder() -> DashProxyBuilder {
        DashProxyBuilder::new()
    }

    pub fn mpd_url(&self) -> &Url {
        &self.mpd_url
    }

    pub fn output_dir(&self) -> &Path {
        self.output.path()
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    pub fn downloaders(&self) -> &HashMap<RepresentationAddress, SegmentDownloader> {
        &self.downloaders
    }

    pub fn stats(&self) -> &DownloadStats {
        self.fetcher.stats()
    }

    /// Run the refresh loop until the stream ends, shutdown is requested or the manifest turns
    /// out to be inconsistent. In-flight downloads are awaited before returning.
    pub async fn run(&mut self) -> ProxyResult<()> {
        tracing::info!(
            "Running dash proxy for stream {}. Output goes in {}",
            self.mpd_url,
            self.output.path().display()
        );

        let result = self.refresh_loop().await;

        if self.fetcher.in_flight() > 0 {
            tracing::info!(
                "Waiting for {} download(s) to finish",
                self.fetcher.in_flight()
            );
        }
        self.fetcher.wait().await;

        let stats = self.fetcher.stats();
        tracing::info!(
            "{} file(s) requested, {} downloaded, {} failed.",
            stats.requested(),
            stats.downloaded(),
            stats.failed()
        );
        result
    }

    async fn refresh_loop(&mut self) -> ProxyResult<()> {
        let mut next_refresh = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, stopping refresh loop.");
                    return Ok(());
                }
                _ = tokio::time::sleep_until(next_refresh) => {}
            }

            match self.refresh().await {
                Ok(RefreshOutcome::Live) => {
                    next_refresh = Instant::now() + self.refresh_interval;
                }
                Ok(RefreshOutcome::OnDemand) => {
                    tracing::info!("VOD MPD. Nothing more to do. Stopping...");
                    return Ok(());
                }
                Err(e) if e.is_structural() => {
                    tracing::error!("Inconsistent MPD: {e}");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "Cannot refresh the MPD: {e}. Retrying after {}s",
                        self.retry_interval.as_secs_f32()
                    );
                    next_refresh = Instant::now() + self.retry_interval;
                }
            }
        }
    }

    /// Fetch, mirror and rewrite the manifest once.
    pub async fn refresh(&mut self) -> ProxyResult<RefreshOutcome> {
        self.refresh_count += 1;
        let refresh = self.refresh_count;

        let body = self
            .client
            .get_bytes(self.mpd_url.clone(), Some(MPD_ACCEPT))
            .await?;

        tracing::debug!("Saving source MPD file");
        self.persist(&format!("manifest.{refresh}.mpd"), &body).await;

        let mut mpd = Document::parse(&String::from_utf8(body.to_vec())?)?;
        if mpd.element(mpd.root()).local_name() != "MPD" {
            return Err(ProxyError::MpdParsing(format!(
                "unexpected root element <{}>",
                mpd.element(mpd.root()).name()
            )));
        }

        let base_url = resolve_base_url(&self.mpd_url, &mpd)?;
        tracing::debug!("Base URL: {base_url}");
        self.handle_mpd_tree(&mut mpd, &base_url).await?;
        self.write_output_mpd(&mpd, refresh).await;

        let minimum_update_period = mpd
            .attributes(mpd.root())
            .get_string("minimumUpdatePeriod", "");
        // TODO: parse minimumUpdatePeriod and use it as the refresh interval
        if minimum_update_period.is_empty() {
            Ok(RefreshOutcome::OnDemand)
        } else {
            Ok(RefreshOutcome::Live)
        }
    }

    async fn handle_mpd_tree(&mut self, mpd: &mut Document, base_url: &Url) -> ProxyResult<()> {
        let periods = mpd.find_all(mpd.root(), "Period");
        tracing::debug!("Found {} periods choosing the 1st one", periods.len());
        let period = *periods.first().ok_or(ProxyError::NoPeriodFound(0))?;

        for (adaptation_set_index, adaptation_set) in
            mpd.find_all(period, "AdaptationSet").into_iter().enumerate()
        {
            for (representation_index, representation) in mpd
                .find_all(adaptation_set, "Representation")
                .into_iter()
                .enumerate()
            {
                tracing::debug!(
                    "Found representation with id {}",
                    mpd.attributes(representation).get_string("id", "UKN")
                );
                let address =
                    RepresentationAddress::new(0, adaptation_set_index, representation_index);
                self.ensure_downloader(mpd, address, base_url).await?;
            }
        }

        Ok(())
    }

    async fn ensure_downloader(
        &mut self,
        mpd: &mut Document,
        address: RepresentationAddress,
        base_url: &Url,
    ) -> ProxyResult<usize> {
        let downloader = match self.downloaders.entry(address) {
            Entry::Occupied(entry) => {
                tracing::debug!("A downloader for {address} already started");
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                tracing::info!("Starting a downloader for {address}");
                entry.insert(SegmentDownloader::new(address))
            }
        };
        downloader.handle_mpd(mpd, base_url, &self.fetcher).await
    }

    async fn write_output_mpd(&self, mpd: &Document, refresh: u64) {
        tracing::info!("Writing the updated MPD file");
        let content = match mpd.to_xml() {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("Failed to serialize MPD: {e}");
                return;
            }
        };

        self.persist("manifest.mpd", &content).await;
        if self.save_individual_mpds {
            self.persist(&format!("manifest.{refresh}.expanded.mpd"), &content)
                .await;
        }
    }

    async fn persist(&self, file_name: &str, content: &[u8]) {
        match self.output.write(Path::new(file_name), content).await {
            Ok(_) => tracing::debug!("{file_name} saved."),
            Err(e) => tracing::error!("{file_name}: Error writing file: {e}"),
        }
    }
}

pub struct DashProxyBuilder {
    output_dir: PathBuf,
    save_individual_mpds: bool,
    retry_interval: Duration,
    refresh_interval: Duration,
    concurrency: Option<NonZeroUsize>,
    client: Option<HttpClient>,
    shutdown: Option<CancellationToken>,
}

impl DashProxyBuilder {
    pub fn new() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            save_individual_mpds: false,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            concurrency: None,
            client: None,
            shutdown: None,
        }
    }

    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Also keep the rewritten manifest of every refresh as `manifest.<n>.expanded.mpd`.
    pub fn save_individual_mpds(mut self, save: bool) -> Self {
        self.save_individual_mpds = save;
        self
    }

    /// Delay before fetching the manifest again after a failed request.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Delay between two refreshes of a live manifest.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Limit the number of concurrent segment downloads. Unlimited by default.
    pub fn concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self, mpd_url: &str) -> ProxyResult<DashProxy> {
        let mpd_url = Url::parse(mpd_url)?;
        let client = match self.client {
            Some(client) => client,
            None => HttpClient::new(reqwest::Client::builder())?,
        };
        let output = OutputDir::new(self.output_dir);
        let fetcher = Fetcher::new(client.clone(), output.clone(), self.concurrency);

        Ok(DashProxy {
            mpd_url,
            client,
            output,
            fetcher,
            save_individual_mpds: self.save_individual_mpds,
            retry_interval: self.retry_interval,
            refresh_interval: self.refresh_interval,
            shutdown: self.shutdown.unwrap_or_default(),
            refresh_count: 0,
            downloaders: HashMap::new(),
        })
    }
}

impl Default for DashProxyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
