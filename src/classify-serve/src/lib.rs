//! Classify the image behind a URL with a pre-trained model.
//!
//! [`Handler::handle`] is the whole invocation: parse `{"url": ...}`, fetch
//! the image, stage it in a private temporary file, run the [`Classifier`]
//! and render the reply text. Hosts (HTTP server, AWS Lambda, CLI) only
//! translate their own request type into a call to it.

mod classifier;
mod config;
mod error;
mod fetch;
mod handler;
mod staging;
mod timer;

#[cfg(any(test, feature = "test-util"))]
pub mod test_support;

pub use classifier::{preprocess, Classification, Classifier, Labels};
#[cfg(feature = "tensorflow")]
pub use classifier::TensorFlowClassifier;
pub use crate::config::{Config, DEFAULT_CONFIG_PATH};
pub use error::{ClassifyError, Result};
pub use fetch::Fetcher;
pub use handler::{prediction_text, ClassifyRequest, Handler, Reply};
pub use staging::StagedImage;
pub use timer::Timer;
