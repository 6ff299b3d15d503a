use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClassifyError>;

/// Every way an invocation can fail.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// Body is not JSON or carries no string `url`
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Upstream answered with something other than 200, or never answered at all
    #[error("Image download failed, url: {url}")]
    DownloadFailed { url: String, reason: String },

    #[error("Image download timed out after {attempts} attempt(s), url: {url}")]
    FetchTimeout { url: String, attempts: u32 },

    #[error("Could not decode image: {0}")]
    DecodeFailed(#[from] image::ImageError),

    /// Model or labels file missing or corrupt
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    /// Temporary image file could not be created or written
    #[error("Could not stage image: {0}")]
    Staging(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl ClassifyError {
    /// HTTP status the hosts answer with for this error
    pub fn status(&self) -> u16 {
        match self {
            ClassifyError::BadRequest(_) => 400,
            ClassifyError::DownloadFailed { .. } => 502,
            ClassifyError::FetchTimeout { .. } => 504,
            ClassifyError::DecodeFailed(_) => 422,
            ClassifyError::ModelUnavailable(_) => 503,
            ClassifyError::Inference(_) | ClassifyError::Staging(_) | ClassifyError::Client(_) => {
                500
            }
        }
    }

    /// True when the caller, not this service, is at fault
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Underlying cause kept out of the reply text
    pub fn detail(&self) -> Option<&str> {
        match self {
            ClassifyError::DownloadFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(feature = "tensorflow")]
impl From<tensorflow::Status> for ClassifyError {
    fn from(status: tensorflow::Status) -> Self {
        ClassifyError::Inference(status.to_string())
    }
}
