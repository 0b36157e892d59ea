use std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use clap::{Args, Parser};
use dashproxy::{DashProxy, HttpClient};
use fake_user_agent::get_chrome_rua;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct DashProxyArgs {
    /// Only print warnings and errors
    #[clap(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode
    #[clap(short, long)]
    verbose: bool,

    /// Saves the cached stream in the output directory.
    ///
    /// Older content from live streams is never deleted, so this is always enabled.
    #[clap(short = 'd', hide = true)]
    download: bool,

    /// Output directory to use for caching the stream.
    #[clap(short, long, default_value = ".")]
    output: PathBuf,

    /// Saves each refreshed MPD in a separate file
    #[clap(long)]
    save_individual_mpds: bool,

    /// Maximum number of segments downloaded at the same time. Unlimited by default.
    #[clap(long)]
    concurrency: Option<NonZeroUsize>,

    #[clap(flatten)]
    http: HttpOptions,

    /// URL of the MPEG-DASH stream to download / cache.
    mpd: String,
}

#[derive(Args, Clone, Debug)]
pub struct HttpOptions {
    /// Additional HTTP headers, e.g. "Referer: https://example.com/"
    #[clap(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Cookies sent with every request, e.g. "a=1; b=2"
    #[clap(long)]
    pub cookies: Option<String>,

    /// HTTP timeout, in seconds
    #[clap(short, long, default_value = "10")]
    pub timeout: u64,
}

impl HttpOptions {
    pub fn into_client(self, mpd_url: &str) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();
        for header in &self.headers {
            let (key, value) = header
                .split_once(':')
                .with_context(|| format!("Invalid header: {header}"))?;
            headers.insert(
                HeaderName::from_str(key.trim()).context("Invalid header name")?,
                HeaderValue::from_str(value.trim()).context("Invalid header value")?,
            );
        }

        let client = HttpClient::new(
            Client::builder()
                .default_headers(headers)
                .user_agent(get_chrome_rua())
                .timeout(Duration::from_secs(self.timeout)),
        )?;

        if let Some(cookies) = self.cookies {
            let url = mpd_url.parse::<reqwest::Url>().context("Invalid MPD url")?;
            let cookies = cookies
                .split(';')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            client.add_cookies(cookies, &url);
        }

        Ok(client)
    }
}

impl DashProxyArgs {
    fn init_logging(&self) {
        let level = if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("warn,dashproxy={level}")));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    async fn run(self) -> anyhow::Result<()> {
        if self.download {
            tracing::debug!("Downloading is always enabled, -d has no effect");
        }

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            // wait for the first ctrl-c to stop refreshing
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            tracing::info!("Ctrl-C received, waiting for pending downloads.");
            token.cancel();

            // wait for the second ctrl-c to force exit
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received again, force exit.");
                std::process::exit(1);
            }
        });

        let client = self.http.into_client(&self.mpd)?;
        let mut builder = DashProxy::builder()
            .client(client)
            .output_dir(self.output)
            .save_individual_mpds(self.save_individual_mpds)
            .shutdown(shutdown);
        if let Some(concurrency) = self.concurrency {
            builder = builder.concurrency(concurrency);
        }

        let mut proxy = builder.build(&self.mpd)?;
        proxy.run().await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = DashProxyArgs::parse();
    args.init_logging();
    args.run().await
}
