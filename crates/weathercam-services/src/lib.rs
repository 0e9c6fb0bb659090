pub mod capture;
pub mod publisher;

pub use capture::{photo_file_name, resolve_output_dir, Camera, CaptureService, CommandCamera};
pub use publisher::{FirestoreClient, Publisher, WeatherRecord};
