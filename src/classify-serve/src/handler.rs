use std::sync::Arc;

use log::{debug, error, info, warn};
use reqwest::Url;
use serde::Deserialize;

use crate::classifier::{Classification, Classifier};
use crate::config::Config;
use crate::error::{ClassifyError, Result};
use crate::fetch::Fetcher;
use crate::staging::StagedImage;
use crate::timer::Timer;

/// Body of an invocation: `{"url": "..."}`
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub url: String,
}

impl ClassifyRequest {
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let request: ClassifyRequest = serde_json::from_slice(body)
            .map_err(|e| ClassifyError::BadRequest(format!("invalid request body: {}", e)))?;

        ClassifyRequest::from_url(request.url)
    }

    /// Accept only absolute http(s) URLs
    pub fn from_url(url: String) -> Result<Self> {
        let parsed = Url::parse(&url)
            .map_err(|e| ClassifyError::BadRequest(format!("invalid url '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClassifyError::BadRequest(format!(
                "unsupported url scheme '{}'",
                parsed.scheme()
            )));
        }

        Ok(ClassifyRequest { url })
    }
}

/// What a host sends back: status code and plain text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn ok(body: String) -> Self {
        Reply { status: 200, body }
    }

    pub fn from_error(err: &ClassifyError) -> Self {
        Reply {
            status: err.status(),
            body: err.to_string(),
        }
    }
}

/// Text of a successful invocation.
///
/// The `request_json['url']` prefix is literal and kept for compatibility
/// with existing callers.
pub fn prediction_text(url: &str, pred_class: &str) -> String {
    format!("request_json['url']: {}, pred_class: {}", url, pred_class)
}

/// The request handler, holding the classifier loaded at startup.
#[derive(Clone)]
pub struct Handler {
    classifier: Arc<dyn Classifier>,
    fetcher: Fetcher,
}

impl Handler {
    pub fn new(classifier: Arc<dyn Classifier>, fetcher: Fetcher) -> Self {
        Handler {
            classifier,
            fetcher,
        }
    }

    pub fn from_config(classifier: Arc<dyn Classifier>, config: &Config) -> Result<Self> {
        Ok(Handler::new(classifier, Fetcher::from_config(config)?))
    }

    /// Handle one invocation whose body is `{"url": "..."}`
    pub async fn handle(&self, body: &[u8]) -> Reply {
        let mut t = Timer::new_start("Handling request");

        let reply = match ClassifyRequest::from_json(body) {
            Err(err) => {
                warn!("Rejecting request: {}", err);
                Reply::from_error(&err)
            }
            Ok(request) => match self.classify_url(&request.url).await {
                Ok(classification) => {
                    info!(
                        "{} classified as {} ({:.3})",
                        request.url, classification.tag, classification.probability
                    );
                    Reply::ok(prediction_text(&request.url, &classification.tag))
                }
                Err(err) => {
                    let cause = err.detail().unwrap_or("-");
                    if err.is_client_error() {
                        warn!("Classifying {} failed: {} ({})", request.url, err, cause);
                    } else {
                        error!("Classifying {} failed: {} ({})", request.url, err, cause);
                    }
                    Reply::from_error(&err)
                }
            },
        };

        t.stop();
        reply
    }

    /// Download `url`, stage it and classify it
    pub async fn classify_url(&self, url: &str) -> Result<Classification> {
        let mut t = Timer::new_start(&format!("Fetching image from {}", url));
        let bytes = self.fetcher.fetch(url).await?;
        let fetch_ms = t.stop();

        let classifier = Arc::clone(&self.classifier);
        let mut classification = run_blocking(move || {
            let staged = StagedImage::write(&bytes)?;
            debug!("Staged image at {}", staged.path().display());

            let mut t = Timer::new_start("Load image from staging file");
            let image = staged.open()?;
            let load_ms = t.stop();

            let mut classification = classifier.classify(&image)?;
            classification.time_image_load = load_ms;
            Ok(classification)
        })
        .await?;

        classification.time_url_fetch = fetch_ms;
        Ok(classification)
    }

    /// Classify an image that arrived as the request body itself
    pub async fn classify_bytes(&self, bytes: Vec<u8>) -> Result<Classification> {
        let classifier = Arc::clone(&self.classifier);

        run_blocking(move || {
            let mut t = Timer::new_start("Load image from memory");
            let image = image::load_from_memory(&bytes)?;
            let load_ms = t.stop();

            let mut classification = classifier.classify(&image)?;
            classification.time_image_load = load_ms;
            Ok(classification)
        })
        .await
    }
}

async fn run_blocking<F>(f: F) -> Result<Classification>
where
    F: FnOnce() -> Result<Classification> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ClassifyError::Inference(format!("classification task failed: {}", e)))?
}
