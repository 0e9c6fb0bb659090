//! Capture timestamp from the photo's EXIF block.
//!
//! Only `DateTimeDigitized` is consulted. The value is returned verbatim in
//! EXIF form (`YYYY:MM:DD HH:MM:SS`), which is what published documents carry.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Stored in place of the timestamp when the photo has none.
pub const MISSING_TIME: &str = "null";

/// Read the digitized timestamp, if the photo carries one.
///
/// Only I/O failures are errors. A photo without EXIF data, or with a
/// malformed block, yields `Ok(None)`.
pub fn read_capture_time(path: &Path) -> std::io::Result<Option<String>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::Io(e)) => return Err(e),
        Err(e) => {
            tracing::debug!("No usable EXIF in {}: {}", path.display(), e);
            return Ok(None);
        }
    };

    let Some(field) = exif.get_field(exif::Tag::DateTimeDigitized, exif::In::PRIMARY) else {
        return Ok(None);
    };

    let value = match &field.value {
        exif::Value::Ascii(parts) => parts.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .trim()
                .to_string()
        }),
        _ => None,
    };

    Ok(value.filter(|s| !s.is_empty()))
}

/// Timestamp string for output, `"null"` when absent or unreadable.
pub fn extract_capture_time(path: &Path) -> String {
    match read_capture_time(path) {
        Ok(Some(time)) => time,
        Ok(None) => MISSING_TIME.to_string(),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            MISSING_TIME.to_string()
        }
    }
}
