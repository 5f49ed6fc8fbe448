use std::{future::Future, path::Path, time::Duration};

use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::{header::RANGE, StatusCode};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::StreamReader;
use url::Url;

use crate::{
    download::SegmentFetch,
    error::{TsumugiError, TsumugiResult},
    util::{http::HttpClient, path::TsumugiPathExt},
    ByteRange,
};

/// Linear backoff: the `n`-th failed attempt waits `delay * n` before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self {
            retries: retries.max(1),
            delay,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// HTTP fetcher for manifests, whole segments and byte ranges.
#[derive(Clone)]
pub struct Fetcher {
    client: HttpClient,
    policy: RetryPolicy,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn with_retry<T, F, Fut>(&self, url: &Url, mut attempt_fn: F) -> TsumugiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TsumugiResult<T>>,
    {
        let retries = self.policy.retries;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= retries {
                return Err(TsumugiError::Download {
                    url: url.to_string(),
                    attempts: attempt,
                    reason: error.to_string(),
                });
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                "Fetching {url} failed ({attempt} / {retries}), retry in {delay:?}. {error}"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Download `url` into `path`, returning the number of bytes written.
    ///
    /// The body is written to `<path>.tmp` first and moved over `path` once complete. An
    /// empty result counts as a failed attempt.
    pub async fn download(&self, url: &Url, path: &Path) -> TsumugiResult<u64> {
        self.with_retry(url, || self.download_once(url, path)).await
    }

    async fn download_once(&self, url: &Url, path: &Path) -> TsumugiResult<u64> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(TsumugiError::HttpError(response.status()));
        }

        let tmp_path = path.append_extension("tmp");
        let mut reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let mut tmp_file = File::create(&tmp_path).await?;
        let copied = async {
            tokio::io::copy(&mut reader, &mut tmp_file).await?;
            tmp_file.flush().await
        }
        .await;
        drop(tmp_file);
        if let Err(e) = copied {
            _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        if fs::rename(&tmp_path, path).await.is_err() {
            // eg. the destination lives on another device
            fs::copy(&tmp_path, path).await?;
            fs::remove_file(&tmp_path).await?;
        }

        let size = fs::metadata(path).await?.len();
        if size == 0 {
            fs::remove_file(path).await?;
            return Err(TsumugiError::Integrity(path.to_path_buf()));
        }

        Ok(size)
    }

    /// Single attempt at reading `range` of `url`. Both `200` and `206` are accepted.
    pub async fn fetch_range(&self, url: &Url, range: ByteRange) -> TsumugiResult<Bytes> {
        let range_error = |reason: String| TsumugiError::RangeFetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .header(RANGE, range.to_http_range())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| range_error(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            if let Ok(body) = response.text().await {
                tracing::warn!("Error body: {body}");
            }
            return Err(range_error(format!("unexpected status {status}")));
        }

        response
            .bytes()
            .await
            .map_err(|e| range_error(e.to_string()))
    }

    /// Retrieve a text document, eg. the manifest, with the same retry policy as segments.
    pub async fn fetch_text(&self, url: &Url) -> TsumugiResult<String> {
        self.with_retry(url, || async move {
            let response = self
                .client
                .get(url.clone())
                .timeout(self.timeout)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(TsumugiError::HttpError(response.status()));
            }
            Ok(response.text().await?)
        })
        .await
    }
}

impl SegmentFetch for Fetcher {
    fn download(&self, url: &Url, path: &Path) -> impl Future<Output = TsumugiResult<u64>> + Send {
        Fetcher::download(self, url, path)
    }

    fn fetch_range(
        &self,
        url: &Url,
        range: ByteRange,
    ) -> impl Future<Output = TsumugiResult<Bytes>> + Send {
        Fetcher::fetch_range(self, url, range)
    }
}
