//! Inference pipeline.
//!
//! Decodes an uploaded leaf photo, shapes it the way the model was trained
//! (128×128 RGB, NHWC, raw 0–255 values), runs the classifier and returns the
//! index of the highest score.
//!
//! The classifier itself is opaque: anything implementing [`Classifier`] can
//! be plugged in through a [`ModelLoader`]. [`OnnxModelLoader`] is the bundled
//! loader for ONNX exports of the trained model.
//!
//! # Label order
//!
//! Output index `i` means `DiseaseLabel::ALL[i]`. Two checks guard that
//! contract: [`InferencePipeline::predict_label`] rejects score vectors whose
//! width is not `DiseaseLabel::COUNT`, and if a label manifest
//! (`<model stem>.labels.json`, a JSON array of class names) sits next to the
//! model file it must list the labels in exactly that order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use thiserror::Error;
use tract_onnx::prelude::*;

use plant_health_core::DiseaseLabel;

/// Side length of the square image the model expects.
pub const INPUT_SIZE: u32 = 128;

/// Colour channels per pixel.
pub const INPUT_CHANNELS: usize = 3;

/// Errors from the inference pipeline.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The upload is not a decodable image.
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The model file could not be loaded or run.
    #[error("model error: {0}")]
    Model(String),

    /// The model produced no scores.
    #[error("model returned an empty output")]
    EmptyOutput,

    /// The model's classes do not match the known label list.
    #[error("model labels do not match the known disease labels: {0}")]
    LabelMismatch(String),

    /// The blocking inference task panicked or was cancelled.
    #[error("inference task failed: {0}")]
    Task(String),
}

/// A batch-of-one input tensor, NHWC `[1, 128, 128, 3]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    /// Tensor shape.
    pub const SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

    /// Flat values in row-major NHWC order.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Decode an image and shape it for the model.
///
/// The image is converted to RGB and resized to exactly 128×128 with
/// nearest-neighbour sampling; the aspect ratio is not preserved. Pixel values
/// stay in 0–255.
///
/// # Errors
///
/// Returns `InferenceError::Decode` if the bytes are not a supported image.
pub fn preprocess(bytes: &[u8]) -> Result<InputTensor, InferenceError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Nearest);

    let data = resized
        .pixels()
        .flat_map(|pixel| pixel.0)
        .map(f32::from)
        .collect();

    Ok(InputTensor { data })
}

/// Index of the largest score. Ties go to the first maximum; NaN scores are
/// skipped.
///
/// Returns `None` if no score is a number (including an empty slice).
#[must_use]
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Scores one input tensor.
pub trait Classifier: Send + Sync {
    /// One score per class, in the model's output order.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError::Model` if inference fails.
    fn scores(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError>;
}

/// Loads a [`Classifier`] from a model file.
pub trait ModelLoader: Send + Sync {
    /// # Errors
    ///
    /// Returns `InferenceError::Model` if the file cannot be loaded.
    fn load(&self, path: &Path) -> Result<Box<dyn Classifier>, InferenceError>;
}

/// Loads ONNX models with `tract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxModelLoader;

/// An optimized, runnable ONNX graph.
struct OnnxClassifier {
    plan: TypedSimplePlan<TypedModel>,
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn Classifier>, InferenceError> {
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact(InputTensor::SHAPE).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InferenceError::Model(format!("{}: {e}", path.display())))?;

        Ok(Box::new(OnnxClassifier { plan }))
    }
}

impl Classifier for OnnxClassifier {
    fn scores(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        let model_err = |e: TractError| InferenceError::Model(e.to_string());

        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_vec(InputTensor::SHAPE, input.as_slice().to_vec())
                .map_err(|e| InferenceError::Model(e.to_string()))?
                .into();

        let outputs = self.plan.run(tvec!(tensor.into())).map_err(model_err)?;
        let first = outputs.first().ok_or(InferenceError::EmptyOutput)?;
        let view = first.to_array_view::<f32>().map_err(model_err)?;

        Ok(view.iter().copied().collect())
    }
}

/// Path of the optional label manifest for a model file.
///
/// `local_cache/model.onnx` → `local_cache/model.labels.json`.
#[must_use]
pub fn labels_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("labels.json")
}

/// Check the label manifest next to `model_path`, if there is one.
fn check_label_manifest(model_path: &Path) -> Result<(), InferenceError> {
    let manifest = labels_path(model_path);
    let contents = match std::fs::read_to_string(&manifest) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(InferenceError::LabelMismatch(format!(
                "cannot read {}: {e}",
                manifest.display()
            )));
        }
    };

    let labels: Vec<String> = serde_json::from_str(&contents).map_err(|e| {
        InferenceError::LabelMismatch(format!("{} is not a JSON string array: {e}", manifest.display()))
    })?;

    let expected = DiseaseLabel::ALL.map(DiseaseLabel::as_str);
    if labels.len() != expected.len() {
        return Err(InferenceError::LabelMismatch(format!(
            "manifest lists {} labels, expected {}",
            labels.len(),
            expected.len()
        )));
    }
    if let Some((i, (found, want))) = labels
        .iter()
        .zip(expected)
        .enumerate()
        .find(|(_, (found, want))| found.as_str() != *want)
    {
        return Err(InferenceError::LabelMismatch(format!(
            "index {i} is '{found}', expected '{want}'"
        )));
    }

    Ok(())
}

/// Loads the model and classifies images.
#[derive(Clone)]
pub struct InferencePipeline {
    loader: Arc<dyn ModelLoader>,
}

impl InferencePipeline {
    #[must_use]
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self { loader }
    }

    /// Pipeline backed by [`OnnxModelLoader`].
    #[must_use]
    pub fn onnx() -> Self {
        Self::new(Arc::new(OnnxModelLoader))
    }

    /// Classify an image with the model at `model_path` and return the
    /// index of the top score.
    ///
    /// Every input yields an index; there is no confidence threshold.
    ///
    /// # Errors
    ///
    /// Returns an `InferenceError` if the image cannot be decoded, the model
    /// cannot be loaded or run, or the label manifest disagrees.
    pub async fn predict(&self, model_path: &Path, image: Vec<u8>) -> Result<usize, InferenceError> {
        let scores = self.scores(model_path, image).await?;
        argmax(&scores).ok_or(InferenceError::EmptyOutput)
    }

    /// Like [`predict`](Self::predict), mapped onto [`DiseaseLabel`].
    ///
    /// # Errors
    ///
    /// Additionally returns `InferenceError::LabelMismatch` if the model does
    /// not output exactly one score per known label.
    pub async fn predict_label(
        &self,
        model_path: &Path,
        image: Vec<u8>,
    ) -> Result<DiseaseLabel, InferenceError> {
        let scores = self.scores(model_path, image).await?;
        if scores.len() != DiseaseLabel::COUNT {
            return Err(InferenceError::LabelMismatch(format!(
                "model outputs {} scores, expected {}",
                scores.len(),
                DiseaseLabel::COUNT
            )));
        }

        let index = argmax(&scores).ok_or(InferenceError::EmptyOutput)?;
        DiseaseLabel::from_index(index)
            .ok_or_else(|| InferenceError::LabelMismatch(format!("no label for index {index}")))
    }

    /// Run the CPU-bound steps on the blocking pool.
    async fn scores(&self, model_path: &Path, image: Vec<u8>) -> Result<Vec<f32>, InferenceError> {
        let loader = Arc::clone(&self.loader);
        let model_path = model_path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            check_label_manifest(&model_path)?;
            let input = preprocess(&image)?;
            let classifier = loader.load(&model_path)?;
            let scores = classifier.scores(&input)?;
            tracing::debug!(model = %model_path.display(), classes = scores.len(), "Inference complete");
            Ok(scores)
        })
        .await
        .map_err(|e| InferenceError::Task(e.to_string()))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::io::Cursor;

    use super::*;

    /// Returns fixed scores regardless of input.
    pub(crate) struct StubClassifier(pub Vec<f32>);

    impl Classifier for StubClassifier {
        fn scores(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
            assert_eq!(input.as_slice().len(), 128 * 128 * 3);
            Ok(self.0.clone())
        }
    }

    /// Hands out [`StubClassifier`]s for any path.
    pub(crate) struct StubLoader(pub Vec<f32>);

    impl ModelLoader for StubLoader {
        fn load(&self, _path: &Path) -> Result<Box<dyn Classifier>, InferenceError> {
            Ok(Box::new(StubClassifier(self.0.clone())))
        }
    }

    /// A small deterministic PNG.
    pub(crate) fn test_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 0.9, 0.0]), Some(1));
        assert_eq!(argmax(&[3.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_argmax_tie_takes_first() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5, 0.1]), Some(1));
        assert_eq!(argmax(&[1.0, 1.0, 1.0]), Some(0));
    }

    #[test]
    fn test_argmax_skips_nan() {
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.9]), Some(2));
        assert_eq!(argmax(&[0.2, 0.9, f32::NAN]), Some(1));
        assert_eq!(argmax(&[f32::NAN, f32::NAN]), None);
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let tensor = preprocess(&test_png(300, 200)).unwrap();
        let values = tensor.as_slice();
        assert_eq!(values.len(), 128 * 128 * 3);
        assert!(values.iter().all(|v| (0.0..=255.0).contains(v)));
        // Blue channel is constant in the fixture.
        assert!((values[2] - 128.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_preprocess_rejects_garbage() {
        assert!(matches!(
            preprocess(b"definitely not an image"),
            Err(InferenceError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_predict_with_stub_model() {
        let pipeline = InferencePipeline::new(Arc::new(StubLoader(vec![0.1, 0.9, 0.0])));
        let index = pipeline
            .predict(Path::new("unused.onnx"), test_png(64, 64))
            .await
            .unwrap();
        assert_eq!(index, 1);
    }

    #[tokio::test]
    async fn test_predict_label_requires_full_width() {
        let pipeline = InferencePipeline::new(Arc::new(StubLoader(vec![0.1, 0.9, 0.0])));
        let result = pipeline
            .predict_label(Path::new("unused.onnx"), test_png(64, 64))
            .await;
        assert!(matches!(result, Err(InferenceError::LabelMismatch(_))));
    }

    #[tokio::test]
    async fn test_predict_label_maps_index() {
        let mut scores = vec![0.0; DiseaseLabel::COUNT];
        scores[DiseaseLabel::LateBlight.index()] = 0.8;
        let pipeline = InferencePipeline::new(Arc::new(StubLoader(scores)));
        let label = pipeline
            .predict_label(Path::new("unused.onnx"), test_png(64, 64))
            .await
            .unwrap();
        assert_eq!(label, DiseaseLabel::LateBlight);
    }

    #[tokio::test]
    async fn test_label_manifest_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.onnx");
        let pipeline = InferencePipeline::new(Arc::new(StubLoader(vec![1.0; 10])));

        let good: Vec<&str> = DiseaseLabel::ALL.iter().map(|l| l.as_str()).collect();
        std::fs::write(labels_path(&model), serde_json::to_string(&good).unwrap()).unwrap();
        assert!(pipeline.predict(&model, test_png(8, 8)).await.is_ok());

        let mut swapped = good.clone();
        swapped.swap(0, 1);
        std::fs::write(labels_path(&model), serde_json::to_string(&swapped).unwrap()).unwrap();
        let result = pipeline.predict(&model, test_png(8, 8)).await;
        assert!(matches!(result, Err(InferenceError::LabelMismatch(_))));
    }

    #[test]
    fn test_labels_path() {
        assert_eq!(
            labels_path(Path::new("local_cache/model.onnx")),
            Path::new("local_cache/model.labels.json")
        );
    }

    #[test]
    fn test_onnx_loader_missing_file() {
        let result = OnnxModelLoader.load(Path::new("/nonexistent/model.onnx"));
        assert!(matches!(result, Err(InferenceError::Model(_))));
    }
}
