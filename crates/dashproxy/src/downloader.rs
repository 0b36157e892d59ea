use url::Url;

use crate::{
    error::ProxyResult,
    fetch::Fetcher,
    mpd::{
        document::{Attributes, Document},
        render_template,
        timeline::{self, TimelineEntry},
        url::{is_absolute_url, merge_baseurls},
        MpdLocator, RepresentationAddress, SegmentVars,
    },
    storage::segment_path,
};

/// Downloads the segments of one representation.
///
/// A downloader lives as long as the proxy. Every manifest refresh calls
/// [`SegmentDownloader::handle_mpd`] again, which requests every segment the current
/// manifest lists. Segments that were downloaded before are fetched and overwritten again.
/// The initialization segment is requested only once.
#[derive(Debug)]
pub struct SegmentDownloader {
    address: RepresentationAddress,
    initialization_downloaded: bool,
    refreshes: u64,
}

impl SegmentDownloader {
    pub fn new(address: RepresentationAddress) -> Self {
        Self {
            address,
            initialization_downloaded: false,
            refreshes: 0,
        }
    }

    pub fn address(&self) -> RepresentationAddress {
        self.address
    }

    pub fn initialization_downloaded(&self) -> bool {
        self.initialization_downloaded
    }

    /// How many manifests this downloader has handled.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Issue downloads for everything `mpd` lists for this representation, returning how
    /// many were requested.
    ///
    /// The representation's `SegmentTimeline` is expanded in place, see [`timeline::reconstruct`].
    #[tracing::instrument(skip_all, fields(representation = %self.address))]
    pub async fn handle_mpd(
        &mut self,
        mpd: &mut Document,
        base_url: &Url,
        fetcher: &Fetcher,
    ) -> ProxyResult<usize> {
        self.refreshes += 1;

        let locator = MpdLocator::new(mpd);
        let representation = mpd.attributes(locator.representation(&self.address)?).clone();
        let subdir = locator.base_url(&self.address)?.map(str::to_string);
        let template = mpd.attributes(locator.segment_template(&self.address)?).clone();
        let segment_timeline = locator.segment_timeline(&self.address)?;

        tracing::debug!("subdir = {subdir:?}");
        let local_subdir = subdir.as_deref().filter(|s| !is_absolute_url(s));
        if let Some(local_subdir) = local_subdir {
            match fetcher.output().ensure_dir(&segment_path(Some(local_subdir), "")).await {
                Ok(dir) => tracing::debug!("Created dir: {}", dir.display()),
                Err(e) => tracing::error!("Failed to create output directory: {e}"),
            }
        }

        // the period BaseURL only places files on disk, fetches use the manifest base
        let request = SegmentRequest {
            fetcher,
            base_url,
            subdir: local_subdir,
            representation: &representation,
        };

        let mut requested = 0;
        if let Some(initialization) = template.get("initialization").filter(|i| !i.is_empty()) {
            if !self.initialization_downloaded && request.issue(initialization, None) {
                self.initialization_downloaded = true;
                requested += 1;
            }
        }

        let Some(segment_timeline) = segment_timeline else {
            tracing::debug!("No SegmentTimeline, nothing to download");
            return Ok(requested);
        };
        let entries = timeline::reconstruct(mpd, segment_timeline);

        let Some(media) = template.get("media").filter(|m| !m.is_empty()) else {
            tracing::warn!(
                "SegmentTemplate has no media attribute, skipping {} segments",
                entries.len()
            );
            return Ok(requested);
        };
        requested += request.issue_all(media, &template, &entries);

        Ok(requested)
    }
}

struct SegmentRequest<'a> {
    fetcher: &'a Fetcher,
    base_url: &'a Url,
    subdir: Option<&'a str>,
    representation: &'a Attributes,
}

impl SegmentRequest<'_> {
    fn issue_all(&self, media: &str, template: &Attributes, entries: &[TimelineEntry]) -> usize {
        let start_number = template.get_uint("startNumber", 1);
        let mut issued = 0;
        for (number, entry) in (start_number..).zip(entries) {
            let segment = SegmentVars {
                time: entry.start,
                number,
            };
            if self.issue(media, Some(segment)) {
                issued += 1;
            }
        }
        issued
    }

    /// Render `template` and spawn its download. Failures only affect this file.
    fn issue(&self, template: &str, segment: Option<SegmentVars>) -> bool {
        let rendered = match render_template(template, Some(self.representation), segment) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::error!("Failed to render {template:?}: {e}");
                return false;
            }
        };
        let url = match merge_baseurls(self.base_url, &rendered) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Invalid segment url {rendered:?}: {e}");
                return false;
            }
        };

        let path = segment_path(self.subdir, &rendered);
        if path.as_os_str().is_empty() {
            tracing::error!("Segment url {url} does not map to a file");
            return false;
        }
        self.fetcher.spawn(url, path);
        true
    }
}
