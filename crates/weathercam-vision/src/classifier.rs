//! Weather classifier.
//!
//! The model is a fixed-shape image classifier: input `[1, 224, 224, 3]`
//! f32, output `[1, 3]` f32 in sunny/cloudy/rain order.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tract_onnx::prelude::*;
use weathercam_core::InferenceError;

use crate::preprocess::{InputTensor, INPUT_SHAPE};
use crate::types::ProbabilityVector;

const OUTPUT_SHAPE: [usize; 2] = [1, 3];

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, tensor: InputTensor) -> Result<ProbabilityVector, InferenceError>;
}

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX export of the classifier, executed with tract on the blocking pool.
#[derive(Clone)]
pub struct OnnxClassifier {
    plan: Arc<Plan>,
}

impl OnnxClassifier {
    /// Load and optimize the model, pinning its input to the fixed shape.
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let load_err = |e: TractError| InferenceError::ModelLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let start = Instant::now();
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact(INPUT_SHAPE).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(load_err)?;

        tracing::info!(
            "Loaded weather model {} in {}ms",
            path.display(),
            start.elapsed().as_millis()
        );

        Ok(Self {
            plan: Arc::new(plan),
        })
    }

    fn run(plan: &Plan, tensor: &InputTensor) -> Result<ProbabilityVector, InferenceError> {
        let runtime_err = |e: TractError| InferenceError::Runtime(e.to_string());

        let input = Tensor::from_shape(&INPUT_SHAPE, tensor.as_slice()).map_err(runtime_err)?;
        let outputs = plan.run(tvec!(input.into())).map_err(runtime_err)?;

        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::Runtime("model produced no outputs".to_string()))?;
        let view = output.to_array_view::<f32>().map_err(runtime_err)?;

        if view.shape() != OUTPUT_SHAPE {
            return Err(InferenceError::ShapeMismatch {
                expected: OUTPUT_SHAPE.to_vec(),
                actual: view.shape().to_vec(),
            });
        }

        let values: Vec<f32> = view.iter().copied().collect();
        ProbabilityVector::from_slice(&values)
    }
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier").finish_non_exhaustive()
    }
}

#[async_trait]
impl Classifier for OnnxClassifier {
    async fn classify(&self, tensor: InputTensor) -> Result<ProbabilityVector, InferenceError> {
        let plan = Arc::clone(&self.plan);
        let start = Instant::now();

        let probabilities = tokio::task::spawn_blocking(move || Self::run(&plan, &tensor))
            .await
            .map_err(|e| InferenceError::Worker(e.to_string()))??;

        tracing::debug!("Inference took {}ms", start.elapsed().as_millis());
        Ok(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::preprocess_image;
    use crate::types::WeatherLabel;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::path::PathBuf;

    /// Minimal protobuf writer, enough for a one-node ONNX graph.
    #[derive(Default)]
    struct Proto(Vec<u8>);

    impl Proto {
        fn varint(&mut self, mut value: u64) {
            while value >= 0x80 {
                self.0.push((value as u8) | 0x80);
                value >>= 7;
            }
            self.0.push(value as u8);
        }

        fn int(mut self, field: u64, value: u64) -> Self {
            self.varint(field << 3);
            self.varint(value);
            self
        }

        fn bytes(mut self, field: u64, bytes: &[u8]) -> Self {
            self.varint(field << 3 | 2);
            self.varint(bytes.len() as u64);
            self.0.extend_from_slice(bytes);
            self
        }

        fn text(self, field: u64, text: &str) -> Self {
            self.bytes(field, text.as_bytes())
        }

        fn msg(self, field: u64, inner: Proto) -> Self {
            self.bytes(field, &inner.0)
        }
    }

    // ValueInfoProto { name, type: TypeProto { tensor_type: { elem_type: FLOAT, shape } } }
    fn float_value(name: &str, dims: &[u64]) -> Proto {
        let shape = dims
            .iter()
            .fold(Proto::default(), |shape, dim| shape.msg(1, Proto::default().int(1, *dim)));
        let tensor = Proto::default().int(1, 1).msg(2, shape);
        Proto::default()
            .text(1, name)
            .msg(2, Proto::default().msg(1, tensor))
    }

    /// Opset-13 model computing `ReduceMean(x, axes, keepdims = 0)`.
    fn reduce_mean_model(axes: &[u64], output_dims: &[u64]) -> Vec<u8> {
        let axes_attr = axes
            .iter()
            .fold(Proto::default().text(1, "axes").int(20, 7), |attr, axis| {
                attr.int(8, *axis)
            });
        let keepdims = Proto::default().text(1, "keepdims").int(3, 0).int(20, 2);
        let node = Proto::default()
            .text(1, "x")
            .text(2, "y")
            .text(3, "mean")
            .text(4, "ReduceMean")
            .msg(5, axes_attr)
            .msg(5, keepdims);
        let graph = Proto::default()
            .msg(1, node)
            .text(2, "weather")
            .msg(11, float_value("x", &INPUT_SHAPE.map(|d| d as u64)))
            .msg(12, float_value("y", output_dims));
        let opset = Proto::default().text(1, "").int(2, 13);

        Proto::default()
            .int(1, 7)
            .text(2, "weathercam-tests")
            .msg(7, graph)
            .msg(8, opset)
            .0
    }

    fn write_model(dir: &Path, bytes: &[u8]) -> PathBuf {
        let path = dir.join("model.onnx");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn solid(color: [u8; 3]) -> InputTensor {
        preprocess_image(&DynamicImage::ImageRgb8(RgbImage::from_pixel(224, 224, Rgb(color))))
    }

    #[test]
    fn test_missing_model_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.onnx");
        let result = OnnxClassifier::load(&path);
        assert!(matches!(
            result,
            Err(InferenceError::ModelLoad { path: ref p, .. }) if *p == path
        ));
    }

    #[test]
    fn test_garbage_model_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"definitely not protobuf").unwrap();
        assert!(matches!(
            OnnxClassifier::load(&path),
            Err(InferenceError::ModelLoad { .. })
        ));
    }

    #[tokio::test]
    async fn test_classifies_with_channel_mean_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(dir.path(), &reduce_mean_model(&[1, 2], &[1, 3]));
        let classifier = OnnxClassifier::load(&path).unwrap();

        let blue = classifier.classify(solid([0, 0, 255])).await.unwrap();
        assert_eq!(blue.top_label(), WeatherLabel::Rain);
        assert!((blue.get(WeatherLabel::Rain) - 1.0).abs() < 1e-4);
        assert!(blue.get(WeatherLabel::Sunny).abs() < 1e-4);
        assert!(blue.get(WeatherLabel::Cloudy).abs() < 1e-4);

        let red = classifier.classify(solid([255, 0, 0])).await.unwrap();
        assert_eq!(red.top_label(), WeatherLabel::Sunny);
    }

    #[tokio::test]
    async fn test_wrong_output_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(dir.path(), &reduce_mean_model(&[1], &[1, 224, 3]));
        let classifier = OnnxClassifier::load(&path).unwrap();

        let result = classifier.classify(solid([0, 0, 255])).await;
        assert!(
            matches!(
                result,
                Err(InferenceError::ShapeMismatch { ref expected, ref actual })
                    if *expected == vec![1, 3] && *actual == vec![1, 224, 3]
            ),
            "unexpected result: {:?}",
            result
        );
    }
}
