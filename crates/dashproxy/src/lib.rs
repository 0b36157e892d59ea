//! Mirror an MPEG-DASH stream to a local directory.
//!
//! ```text
//!  ┌──────────────┐  refresh   ┌──────────────┐  (0, a, r)  ┌────────────────────┐
//!  │   MPD URL    ├────────────►  DashProxy   ├─────────────►  SegmentDownloader ├──┐
//!  └──────────────┘            │              │             └────────────────────┘  │ spawn
//!         ▲                    │  registry    │             ┌────────────────────┐  │
//!         │ minimumUpdatePeriod│  manifest.mpd├─────────────►  SegmentDownloader ├──┤
//!         └────────────────────┤              │             └────────────────────┘  │
//!                              └──────────────┘                                     ▼
//!                                                                      ┌────────────────────┐
//!                                                                      │ Fetcher: GET+write │
//!                                                                      └────────────────────┘
//! ```

pub mod downloader;
pub mod error;
pub mod fetch;
pub mod http;
pub mod mpd;
pub mod proxy;
pub mod storage;

pub use downloader::SegmentDownloader;
pub use error::{ProxyError, ProxyResult};
pub use http::HttpClient;
pub use proxy::{DashProxy, DashProxyBuilder};
