//! Packet results and the contract a retrieved packet must satisfy

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Elementary stream kind accepted by `seekMediaPacket`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One packet as it crossed the page boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(default)]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A packet plus what the page reported about its payload storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketReading {
    pub packet: Packet,
    /// `data.buffer.byteLength` observed in the page, if `data` had a buffer
    pub backing_byte_length: Option<u64>,
}

impl PacketReading {
    /// Byte length of the storage behind `data`
    ///
    /// Falls back to the materialized byte count when the page could not see
    /// a buffer (plain array payloads).
    pub fn backing_len(&self) -> Option<u64> {
        self.backing_byte_length
            .or_else(|| self.packet.data.as_ref().map(|d| d.len() as u64))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PacketViolation {
    SizeNotPositive(Option<f64>),
    DataMissing,
    DataEmpty,
    TimestampNotPositive(Option<f64>),
    DurationNotPositive(Option<f64>),
}

impl fmt::Display for PacketViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(v: &Option<f64>) -> String {
            v.map(|x| x.to_string()).unwrap_or_else(|| "undefined".to_string())
        }
        match self {
            PacketViolation::SizeNotPositive(v) => write!(f, "size should be > 0, got {}", show(v)),
            PacketViolation::DataMissing => write!(f, "data should be defined"),
            PacketViolation::DataEmpty => write!(f, "data should have non-empty backing storage"),
            PacketViolation::TimestampNotPositive(v) => {
                write!(f, "timestamp should be > 0, got {}", show(v))
            }
            PacketViolation::DurationNotPositive(v) => {
                write!(f, "duration should be > 0, got {}", show(v))
            }
        }
    }
}

fn positive(v: Option<f64>) -> bool {
    v.map_or(false, |x| x > 0.0)
}

/// Checks a packet retrieved by a seek on `kind`
///
/// Duration is only required for video: audio packets may legitimately carry
/// a zero or missing duration depending on codec framing.
pub fn check_packet(kind: StreamKind, reading: &PacketReading) -> Result<(), Vec<PacketViolation>> {
    let packet = &reading.packet;
    let mut violations = Vec::new();

    if !positive(packet.size) {
        violations.push(PacketViolation::SizeNotPositive(packet.size));
    }
    if packet.data.is_none() {
        violations.push(PacketViolation::DataMissing);
    } else if reading.backing_len().unwrap_or(0) == 0 {
        violations.push(PacketViolation::DataEmpty);
    }
    if !positive(packet.timestamp) {
        violations.push(PacketViolation::TimestampNotPositive(packet.timestamp));
    }
    if kind == StreamKind::Video && !positive(packet.duration) {
        violations.push(PacketViolation::DurationNotPositive(packet.duration));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
