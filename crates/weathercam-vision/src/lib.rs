//! Image side of a capture cycle: EXIF timestamp, tensor preparation and
//! weather classification.

pub mod classifier;
pub mod metadata;
pub mod preprocess;
pub mod types;

pub use classifier::{Classifier, OnnxClassifier};
pub use metadata::{extract_capture_time, read_capture_time, MISSING_TIME};
pub use preprocess::{preprocess, preprocess_image, InputTensor, INPUT_SHAPE, INPUT_SIZE};
pub use types::{ProbabilityVector, WeatherLabel};
