use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode};

use crate::config::Config;
use crate::error::{ClassifyError, Result};

/// Downloads images with a per-attempt timeout and bounded retry.
///
/// Only transport failures and timeouts are retried. Any HTTP status the
/// upstream answers with is final, and everything but 200 is a failed
/// download.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    retries: u32,
    backoff: Duration,
}

impl Fetcher {
    pub fn new(timeout: Duration, retries: u32, backoff: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Fetcher {
            client,
            retries,
            backoff,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Fetcher::new(
            config.fetch_timeout(),
            config.fetch_retries,
            config.retry_backoff(),
        )
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let attempts = self.retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.client.get(url).send().await {
                Ok(resp) if resp.status() == StatusCode::OK => match resp.bytes().await {
                    Ok(body) => {
                        debug!("Fetched {} bytes from {}", body.len(), url);
                        return Ok(body.to_vec());
                    }
                    Err(e) => e,
                },
                Ok(resp) => {
                    warn!("Fetching {} answered {}", url, resp.status());
                    return Err(ClassifyError::DownloadFailed {
                        url: url.to_owned(),
                        reason: format!("HTTP {}", resp.status()),
                    });
                }
                Err(e) => e,
            };

            warn!("Fetching {} failed (attempt {}/{}): {}", url, attempt, attempts, err);

            if err.is_builder() || attempt >= attempts {
                return Err(if err.is_timeout() {
                    ClassifyError::FetchTimeout {
                        url: url.to_owned(),
                        attempts: attempt,
                    }
                } else {
                    ClassifyError::DownloadFailed {
                        url: url.to_owned(),
                        reason: err.to_string(),
                    }
                });
            }

            tokio::time::sleep(self.backoff * attempt).await;
        }
    }
}
