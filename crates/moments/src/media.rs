use thiserror::Error;

/// Maximum accepted video length.
pub const MAX_VIDEO_DURATION_SECONDS: f64 = 30.0;

const VIDEO_FORMATS: &[&str] = &["video/mp4", "video/webm", "video/ogg"];
const IMAGE_FORMATS: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Video file must be in MP4, WebM, or Ogg format (got {0})")]
    UnsupportedVideoFormat(String),

    #[error("Thumbnail image must be in JPEG, PNG, or WebP format (got {0})")]
    UnsupportedImageFormat(String),

    #[error("Failed to read video metadata")]
    MetadataUnreadable,

    #[error("Video duration must be within {max:.0} seconds (got {duration:.1})")]
    DurationExceeded { duration: f64, max: f64 },
}

/// A media file staged for upload: its bytes plus the declared MIME type.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl MediaFile {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }
}

/// MIME type for a file path, by extension.
pub fn content_type_for_path(path: &std::path::Path) -> Option<&'static str> {
    match path.extension()?.to_str()?.to_lowercase().as_str() {
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "ogg" | "ogv" => Some("video/ogg"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub fn is_supported_video_format(content_type: &str) -> bool {
    VIDEO_FORMATS.contains(&content_type)
}

pub fn is_supported_image_format(content_type: &str) -> bool {
    IMAGE_FORMATS.contains(&content_type)
}

/// Validate a video before any network call: format allow-list, then the
/// metadata duration gate.
pub fn validate_video(file: &MediaFile) -> Result<(), MediaError> {
    if !is_supported_video_format(&file.content_type) {
        return Err(MediaError::UnsupportedVideoFormat(file.content_type.clone()));
    }

    let duration = probe_video_duration(file).ok_or(MediaError::MetadataUnreadable)?;
    if duration > MAX_VIDEO_DURATION_SECONDS {
        return Err(MediaError::DurationExceeded {
            duration,
            max: MAX_VIDEO_DURATION_SECONDS,
        });
    }
    Ok(())
}

/// Validate a thumbnail image: format allow-list only.
pub fn validate_image(file: &MediaFile) -> Result<(), MediaError> {
    if !is_supported_image_format(&file.content_type) {
        return Err(MediaError::UnsupportedImageFormat(file.content_type.clone()));
    }
    Ok(())
}

/// Probe the duration of a video from its container metadata.
pub fn probe_video_duration(file: &MediaFile) -> Option<f64> {
    match file.content_type.as_str() {
        "video/mp4" => mp4_duration_seconds(&file.bytes),
        "video/webm" => webm_duration_seconds(&file.bytes),
        _ => None,
    }
}

// ---------- MP4 (ISO BMFF) ----------

/// Find a box of the given type among siblings and return its payload.
fn find_box<'a>(mut data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    while data.len() >= 8 {
        let size32 = u32::from_be_bytes(data[0..4].try_into().ok()?) as u64;
        let box_type = &data[4..8];
        let (header, size) = match size32 {
            0 => (8usize, data.len() as u64), // box extends to end of input
            1 => {
                if data.len() < 16 {
                    return None;
                }
                (16, u64::from_be_bytes(data[8..16].try_into().ok()?))
            }
            n => (8, n),
        };
        if size < header as u64 || size > data.len() as u64 {
            return None;
        }
        if box_type == kind {
            return Some(&data[header..size as usize]);
        }
        data = &data[size as usize..];
    }
    None
}

/// Duration in seconds from the moov/mvhd header.
fn mp4_duration_seconds(bytes: &[u8]) -> Option<f64> {
    let moov = find_box(bytes, b"moov")?;
    let mvhd = find_box(moov, b"mvhd")?;

    let version = *mvhd.first()?;
    let (timescale, duration) = match version {
        0 => {
            // version/flags(4) creation(4) modification(4)
            if mvhd.len() < 20 {
                return None;
            }
            (
                u32::from_be_bytes(mvhd[12..16].try_into().ok()?) as u64,
                u32::from_be_bytes(mvhd[16..20].try_into().ok()?) as u64,
            )
        }
        1 => {
            // version/flags(4) creation(8) modification(8)
            if mvhd.len() < 32 {
                return None;
            }
            (
                u32::from_be_bytes(mvhd[20..24].try_into().ok()?) as u64,
                u64::from_be_bytes(mvhd[24..32].try_into().ok()?),
            )
        }
        _ => return None,
    };

    if timescale == 0 {
        return None;
    }
    Some(duration as f64 / timescale as f64)
}

// ---------- WebM (EBML) ----------

const EBML_SEGMENT: u64 = 0x1853_8067;
const EBML_INFO: u64 = 0x1549_A966;
const EBML_TIMESTAMP_SCALE: u64 = 0x2A_D7B1;
const EBML_DURATION: u64 = 0x4489;

/// Read an EBML element id (marker bits included).
fn read_ebml_id(data: &[u8]) -> Option<(u64, usize)> {
    let first = *data.first()?;
    let len = (first.leading_zeros() as usize) + 1;
    if len > 4 || data.len() < len {
        return None;
    }
    let mut id = 0u64;
    for &byte in &data[..len] {
        id = (id << 8) | byte as u64;
    }
    Some((id, len))
}

/// Read an EBML size (marker bit stripped). An all-ones payload means
/// unknown size.
fn read_ebml_size(data: &[u8]) -> Option<(u64, usize, bool)> {
    let first = *data.first()?;
    let len = (first.leading_zeros() as usize) + 1;
    if len > 8 || data.len() < len {
        return None;
    }
    let mut value = (first as u64) & (0xFF >> len);
    for &byte in &data[1..len] {
        value = (value << 8) | byte as u64;
    }
    let unknown = value == (1u64 << (7 * len)) - 1;
    Some((value, len, unknown))
}

fn be_uint(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Duration in seconds from the Segment/Info headers. TimestampScale is
/// nanoseconds per tick (default 1ms); Duration is a float tick count.
fn webm_duration_seconds(bytes: &[u8]) -> Option<f64> {
    let mut pos = 0usize;
    let mut timescale_ns: u64 = 1_000_000;
    let mut duration_ticks: Option<f64> = None;

    while pos < bytes.len() {
        let (id, id_len) = read_ebml_id(&bytes[pos..])?;
        let (size, size_len, unknown) = read_ebml_size(&bytes[pos + id_len..])?;
        let payload_start = pos + id_len + size_len;

        match id {
            // Descend into the containers that hold the duration
            EBML_SEGMENT | EBML_INFO => {
                pos = payload_start;
            }
            EBML_TIMESTAMP_SCALE if !unknown => {
                let end = payload_start.checked_add(size as usize)?;
                timescale_ns = be_uint(bytes.get(payload_start..end)?);
                pos = end;
            }
            EBML_DURATION if !unknown => {
                let end = payload_start.checked_add(size as usize)?;
                let payload = bytes.get(payload_start..end)?;
                duration_ticks = match payload.len() {
                    4 => Some(f32::from_be_bytes(payload.try_into().ok()?) as f64),
                    8 => Some(f64::from_be_bytes(payload.try_into().ok()?)),
                    _ => None,
                };
                break;
            }
            _ => {
                if unknown {
                    // Cannot skip an unknown-size element we do not parse
                    break;
                }
                pos = payload_start.checked_add(size as usize)?;
            }
        }
    }

    let ticks = duration_ticks?;
    if timescale_ns == 0 {
        return None;
    }
    Some(ticks * timescale_ns as f64 / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ftyp + moov/mvhd(v0) with the given timescale and duration.
    fn mp4_fixture(timescale: u32, duration: u32) -> Vec<u8> {
        let mut mvhd_payload = vec![0u8; 12]; // version/flags, creation, modification
        mvhd_payload.extend_from_slice(&timescale.to_be_bytes());
        mvhd_payload.extend_from_slice(&duration.to_be_bytes());
        mvhd_payload.extend_from_slice(&[0u8; 80]); // rate, volume, matrix, ...

        let mut mvhd = Vec::new();
        mvhd.extend_from_slice(&((8 + mvhd_payload.len()) as u32).to_be_bytes());
        mvhd.extend_from_slice(b"mvhd");
        mvhd.extend_from_slice(&mvhd_payload);

        let mut moov = Vec::new();
        moov.extend_from_slice(&((8 + mvhd.len()) as u32).to_be_bytes());
        moov.extend_from_slice(b"moov");
        moov.extend_from_slice(&mvhd);

        let mut file = Vec::new();
        file.extend_from_slice(&16u32.to_be_bytes());
        file.extend_from_slice(b"ftyp");
        file.extend_from_slice(b"isom\x00\x00\x02\x00");
        file.extend_from_slice(&moov);
        file
    }

    /// Segment > Info > (TimestampScale, Duration) with the duration in
    /// milliseconds (default scale).
    fn webm_fixture(duration_ms: f64) -> Vec<u8> {
        let mut info_payload = Vec::new();
        // TimestampScale: 1_000_000 ns
        info_payload.extend_from_slice(&[0x2A, 0xD7, 0xB1, 0x83, 0x0F, 0x42, 0x40]);
        // Duration: 8-byte float
        info_payload.extend_from_slice(&[0x44, 0x89, 0x88]);
        info_payload.extend_from_slice(&duration_ms.to_be_bytes());

        let mut segment_payload = Vec::new();
        segment_payload.extend_from_slice(&[0x15, 0x49, 0xA9, 0x66]);
        segment_payload.push(0x80 | info_payload.len() as u8);
        segment_payload.extend_from_slice(&info_payload);

        let mut file = Vec::new();
        file.extend_from_slice(&[0x18, 0x53, 0x80, 0x67]);
        file.push(0x80 | segment_payload.len() as u8);
        file.extend_from_slice(&segment_payload);
        file
    }

    fn video(bytes: Vec<u8>, content_type: &str) -> MediaFile {
        MediaFile::new(bytes, content_type)
    }

    #[test]
    fn mp4_duration_is_read_from_mvhd() {
        let file = video(mp4_fixture(1000, 12_000), "video/mp4");
        let duration = probe_video_duration(&file).unwrap();
        assert!((duration - 12.0).abs() < 1e-9);
    }

    #[test]
    fn webm_duration_is_read_from_info() {
        let file = video(webm_fixture(45_000.0), "video/webm");
        let duration = probe_video_duration(&file).unwrap();
        assert!((duration - 45.0).abs() < 1e-6);
    }

    #[test]
    fn over_long_video_is_rejected_before_upload() {
        let file = video(mp4_fixture(1000, 45_000), "video/mp4");
        let err = validate_video(&file).unwrap_err();
        assert!(matches!(err, MediaError::DurationExceeded { .. }));
    }

    #[test]
    fn video_within_the_cap_passes() {
        let file = video(mp4_fixture(1000, 29_000), "video/mp4");
        assert!(validate_video(&file).is_ok());
    }

    #[test]
    fn unsupported_video_format_is_rejected() {
        let file = video(mp4_fixture(1000, 1_000), "video/quicktime");
        let err = validate_video(&file).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedVideoFormat(_)));
    }

    #[test]
    fn unreadable_metadata_is_rejected() {
        let file = video(vec![0u8; 64], "video/mp4");
        let err = validate_video(&file).unwrap_err();
        assert!(matches!(err, MediaError::MetadataUnreadable));
    }

    #[test]
    fn image_format_allow_list() {
        assert!(validate_image(&MediaFile::new(vec![], "image/png")).is_ok());
        assert!(validate_image(&MediaFile::new(vec![], "image/webp")).is_ok());
        let err = validate_image(&MediaFile::new(vec![], "image/gif")).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedImageFormat(_)));
    }

    #[test]
    fn content_types_from_extension() {
        use std::path::Path;
        assert_eq!(content_type_for_path(Path::new("a.mp4")), Some("video/mp4"));
        assert_eq!(content_type_for_path(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(content_type_for_path(Path::new("a.txt")), None);
    }
}
