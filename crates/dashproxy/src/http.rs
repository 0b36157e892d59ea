use std::{ops::Deref, sync::Arc};

use reqwest::{Client, ClientBuilder};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};
use url::Url;

use crate::error::{ProxyError, ProxyResult};

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    cookies_store: Arc<CookieStoreMutex>,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder) -> ProxyResult<Self> {
        let cookies_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = builder.cookie_provider(cookies_store.clone()).build()?;

        Ok(Self {
            client,
            cookies_store,
        })
    }

    /// Add `name=value` cookies scoped to `url`. Unparsable cookies are skipped.
    pub fn add_cookies(&self, cookies: Vec<String>, url: &Url) {
        let Ok(mut lock) = self.cookies_store.lock() else {
            tracing::warn!("Cookie store is poisoned, ignoring cookies");
            return;
        };
        for cookie in cookies {
            if let Err(e) = lock.parse(&cookie, url) {
                tracing::warn!("Ignoring invalid cookie {cookie:?}: {e}");
            }
        }
    }

    /// GET `url` and return the body of a successful response.
    pub async fn get_bytes(&self, url: Url, accept: Option<&str>) -> ProxyResult<bytes::Bytes> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            if let Ok(body) = response.text().await {
                tracing::debug!("Error body: {body}");
            }
            return Err(ProxyError::HttpError(status));
        }

        Ok(response.bytes().await?)
    }
}

impl Deref for HttpClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
