//! Per-cycle state.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use weathercam_geo::Location;
use weathercam_services::WeatherRecord;
use weathercam_vision::{ProbabilityVector, WeatherLabel, MISSING_TIME};

/// Published in place of a coordinate when no location is known.
pub const DEFAULT_COORDINATE: f64 = 0.0;

/// A photo that was saved successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord {
    pub file_path: PathBuf,
    /// EXIF `DateTimeDigitized`, verbatim
    pub capture_timestamp: Option<String>,
}

/// Everything one cycle learned, assembled once inference succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleContext {
    pub cycle_id: u64,
    pub requested_at: DateTime<Local>,
    pub capture: CaptureRecord,
    pub location: Option<Location>,
    pub probabilities: ProbabilityVector,
}

impl CycleContext {
    pub fn label(&self) -> WeatherLabel {
        self.probabilities.top_label()
    }

    fn coordinates(&self) -> (f64, f64) {
        self.location
            .map(|l| (l.latitude, l.longitude))
            .unwrap_or((DEFAULT_COORDINATE, DEFAULT_COORDINATE))
    }

    fn time(&self) -> &str {
        self.capture
            .capture_timestamp
            .as_deref()
            .unwrap_or(MISSING_TIME)
    }

    /// Document to publish. Missing values become their output sentinels here.
    pub fn to_record(&self) -> WeatherRecord {
        let (latitude, longitude) = self.coordinates();
        WeatherRecord {
            weather: self.label().as_str().to_string(),
            latitude,
            longitude,
            time: self.time().to_string(),
        }
    }

    /// Milliseconds from the capture request to `now`.
    pub fn elapsed_ms(&self, now: DateTime<Local>) -> i64 {
        (now - self.requested_at).num_milliseconds()
    }

    /// One-line inference summary for the log.
    pub fn summary(&self) -> String {
        let (latitude, longitude) = self.coordinates();
        format!(
            "{}, latitude : {:.4}, longitude : {:.4}, time : {}",
            self.probabilities,
            latitude,
            longitude,
            self.time()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context(location: Option<Location>, timestamp: Option<&str>) -> CycleContext {
        CycleContext {
            cycle_id: 7,
            requested_at: Local::now(),
            capture: CaptureRecord {
                file_path: PathBuf::from("/photos/20210704091530.jpg"),
                capture_timestamp: timestamp.map(String::from),
            },
            location,
            probabilities: ProbabilityVector::new([0.1, 0.2, 0.7]).unwrap(),
        }
    }

    #[test]
    fn test_record_carries_cycle_values() {
        let ctx = context(Some(Location::new(34.69, 135.5)), Some("2021:07:04 09:15:30"));
        assert_eq!(
            ctx.to_record(),
            WeatherRecord {
                weather: "rain".into(),
                latitude: 34.69,
                longitude: 135.5,
                time: "2021:07:04 09:15:30".into(),
            }
        );
    }

    #[test]
    fn test_record_uses_sentinels_for_missing_values() {
        let record = context(None, None).to_record();
        assert_eq!(record.latitude, 0.0);
        assert_eq!(record.longitude, 0.0);
        assert_eq!(record.time, "null");
    }

    #[test]
    fn test_summary_without_location() {
        assert_eq!(
            context(None, None).summary(),
            "sunny : 0.1000, cloudy : 0.2000, rain : 0.7000, latitude : 0.0000, longitude : 0.0000, time : null"
        );
    }

    #[test]
    fn test_elapsed_since_request() {
        let mut ctx = context(None, None);
        ctx.requested_at = Local.with_ymd_and_hms(2021, 7, 4, 9, 15, 30).unwrap();
        let later = ctx.requested_at + chrono::Duration::milliseconds(1_250);
        assert_eq!(ctx.elapsed_ms(later), 1_250);
    }

    #[test]
    fn test_summary_line() {
        let ctx = context(Some(Location::new(35.5, 139.25)), Some("2021:07:04 09:15:30"));
        assert_eq!(
            ctx.summary(),
            "sunny : 0.1000, cloudy : 0.2000, rain : 0.7000, latitude : 35.5000, longitude : 139.2500, time : 2021:07:04 09:15:30"
        );
    }
}
