//! Canned media info values and sample bytes

use serde_json::{json, Value};

/// Leading bytes of an MP4 (`ftyp` box); the mock demuxer never parses them
pub const MP4_SAMPLE_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom";

/// Leading bytes of a WebM (EBML header)
pub const WEBM_SAMPLE_BYTES: &[u8] = b"\x1a\x45\xdf\xa3\x9f\x42\x86\x81\x01webm";

/// Expected media info for a single-stream H.264 clip
///
/// ```rust
/// use demux_conformance_test_utils::fixtures::clip_media_info;
///
/// let info = clip_media_info();
/// assert_eq!(info["streams"][0]["codec"], "h264");
/// ```
pub fn clip_media_info() -> Value {
    json!({
        "streams": [
            {"id": 0, "codec": "h264", "rotation": 0, "flip": "none", "extradata": [1, 2, 3]}
        ]
    })
}

/// The same clip as the demuxer reports it, volatile fields included
pub fn clip_media_info_as_reported() -> Value {
    json!({
        "filename": "clip.mp4",
        "url": "blob:http://localhost:5173/9a7c",
        "streams": [
            {"id": 0, "codec": "h264", "rotation": 0, "flip": "none", "extradata": [1, 2, 3]}
        ]
    })
}

/// Two-stream media info with the given display transform on the video stream
pub fn rotated_media_info(rotation: i64, flip: &str) -> Value {
    json!({
        "duration": 10.0,
        "streams": [
            {
                "id": 0,
                "codec": "h264",
                "width": 1920,
                "height": 1080,
                "rotation": rotation,
                "flip": flip,
                "extradata": {"0": 1, "1": 100, "2": 0, "3": 31}
            },
            {
                "id": 1,
                "codec": "aac",
                "sampleRate": 48000,
                "channels": 2,
                "rotation": 0,
                "flip": "none"
            }
        ]
    })
}

/// Orientation fixture for a sample rotated by 90 degrees
pub fn rotated_90_orientation() -> Value {
    json!({
        "streams": [
            {"id": 0, "rotation": 90, "flip": "none"},
            {"id": 1, "rotation": 0, "flip": "none"}
        ]
    })
}
