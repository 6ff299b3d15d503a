use std::fs;
use std::path::Path;

use image::DynamicImage;
use log::debug;
use serde::Serialize;

use crate::error::{ClassifyError, Result};

#[cfg(feature = "tensorflow")]
use crate::{config::Config, timer::Timer};
#[cfg(feature = "tensorflow")]
use tensorflow::{Graph, SavedModelBundle, Session, SessionOptions, SessionRunArgs, Tensor};

/// A loaded, read-only model mapping images to labels.
///
/// Implementations are shared between concurrent invocations, so they must
/// not need `&mut self` to predict.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Result<Classification>;
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Classification tag of the image
    pub tag: String,

    /// Score of the winning class
    pub probability: f32,

    /// Time spent fetching image from URL
    pub time_url_fetch: i64,

    /// Time spent loading image in memory
    pub time_image_load: i64,

    /// Time resizing image
    pub time_image_resize: i64,

    /// Time spent on running session
    pub time_session_run: i64,
}

/// Class labels, indexed by model output position.
#[derive(Debug, Clone)]
pub struct Labels(Vec<String>);

impl Labels {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ClassifyError::ModelUnavailable(format!(
                "could not read labels file {}: {}",
                path.display(),
                e
            ))
        })?;

        let labels = Labels::parse(&raw);
        if labels.0.is_empty() {
            return Err(ClassifyError::ModelUnavailable(format!(
                "labels file {} is empty",
                path.display()
            )));
        }

        debug!("Loaded {} labels from {}", labels.0.len(), path.display());
        Ok(labels)
    }

    pub fn parse(raw: &str) -> Self {
        Labels(raw.lines().map(|l| l.trim().to_owned()).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Label and score of the highest scoring class
    pub fn best(&self, scores: &[f32]) -> Result<(String, f32)> {
        let (idx, score) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| ClassifyError::Inference("model returned no scores".to_owned()))?;

        let tag = self.0.get(idx).ok_or_else(|| {
            ClassifyError::Inference(format!(
                "class index {} has no label ({} labels loaded)",
                idx,
                self.0.len()
            ))
        })?;

        Ok((tag.clone(), score))
    }
}

/// Resize to `size`x`size` RGB and scale channels into `[0, 1]`, row-major HWC.
pub fn preprocess(image: &DynamicImage, size: u32) -> Vec<f32> {
    let rgb = image.to_rgb8();

    let resized = image::imageops::resize(&rgb, size, size, image::imageops::FilterType::Triangle);

    resized
        .into_raw()
        .iter()
        .map(|x| *x as f32 / 255f32)
        .collect()
}

/// Classifier backed by a TensorFlow SavedModel.
#[cfg(feature = "tensorflow")]
pub struct TensorFlowClassifier {
    /// TensorFlow model graph
    graph: Graph,

    /// TensorFlow session
    session: Session,

    labels: Labels,
    input_op: String,
    output_op: String,
    image_size: u32,
}

#[cfg(feature = "tensorflow")]
impl TensorFlowClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        let mut t = Timer::new_start("Loading session");

        let labels = Labels::load(&config.labels_path)?;

        let mut graph = Graph::new();
        let session = SavedModelBundle::load(
            &SessionOptions::new(),
            &["serve"],
            &mut graph,
            &config.model_dir,
        )
        .map_err(|e| {
            ClassifyError::ModelUnavailable(format!(
                "could not load model from {}: {}",
                config.model_dir.display(),
                e
            ))
        })?
        .session;

        for op in [&config.input_op, &config.output_op] {
            graph
                .operation_by_name_required(op)
                .map_err(|e| ClassifyError::ModelUnavailable(format!("{}: {}", op, e)))?;
        }

        t.stop();

        Ok(TensorFlowClassifier {
            graph,
            session,
            labels,
            input_op: config.input_op.clone(),
            output_op: config.output_op.clone(),
            image_size: config.image_size,
        })
    }

    /// Run the session on an already preprocessed image
    pub fn run(&self, image: &[f32]) -> Result<Classification> {
        let mut t = Timer::new_start("Running session");

        let side = u64::from(self.image_size);
        let input = Tensor::new(&[1, side, side, 3]).with_values(image)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(
            &self.graph.operation_by_name_required(&self.input_op)?,
            0,
            &input,
        );
        let result = args.request_fetch(&self.graph.operation_by_name_required(&self.output_op)?, 0);

        self.session.run(&mut args)?;
        let output: Tensor<f32> = args.fetch(result)?;

        let run_ms = t.stop();

        let (tag, probability) = self.labels.best(&output)?;

        Ok(Classification {
            tag,
            probability,
            time_session_run: run_ms,
            ..Default::default()
        })
    }
}

#[cfg(feature = "tensorflow")]
impl Classifier for TensorFlowClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Classification> {
        let mut t = Timer::new_start("Resizing image");
        let raw_image = preprocess(image, self.image_size);
        let resize_ms = t.stop();

        let mut classification = self.run(&raw_image)?;
        classification.time_image_resize = resize_ms;

        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn best_picks_highest_score() {
        let labels = Labels::parse("black\ngrizzly\nteddy\n");
        assert_eq!(labels.len(), 3);

        let (tag, p) = labels.best(&[0.1, 0.7, 0.2]).unwrap();
        assert_eq!(tag, "grizzly");
        assert!((p - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn best_rejects_unlabelled_index() {
        let labels = Labels::parse("black\n");
        let err = labels.best(&[0.1, 0.9]).unwrap_err();
        assert!(matches!(err, ClassifyError::Inference(_)));
    }

    #[test]
    fn best_rejects_empty_output() {
        let labels = Labels::parse("black\n");
        assert!(labels.best(&[]).is_err());
    }

    #[test]
    fn missing_labels_file_is_model_unavailable() {
        let err = Labels::load(Path::new("/nonexistent/labels.txt")).unwrap_err();
        assert_eq!(err.status(), 503);
    }

    #[test]
    fn empty_labels_file_is_model_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = Labels::load(file.path()).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelUnavailable(_)));
    }

    #[test]
    fn preprocess_scales_and_resizes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 6, Rgb([255, 0, 51])));
        let raw = preprocess(&img, 4);

        assert_eq!(raw.len(), 4 * 4 * 3);
        assert!((raw[0] - 1.0).abs() < 1e-6);
        assert!(raw[1].abs() < 1e-6);
        assert!((raw[2] - 0.2).abs() < 1e-6);
    }
}
