//! The async routine evaluated inside the harness page
//!
//! The routine reads the bound file, awaits `window.demuxer.load(file)`, then
//! issues exactly one read operation. It never throws across the page
//! boundary: every outcome comes back as an envelope whose `stage` says where
//! it stopped, with binary views materialized into plain byte arrays.

use crate::packet::StreamKind;
use serde::Deserialize;
use serde_json::Value;

/// The single read operation issued after `load`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DemuxerOp {
    GetMediaInfo,
    SeekMediaPacket {
        kind: StreamKind,
        stream_index: u32,
        target: f64,
    },
}

impl DemuxerOp {
    /// JS call expression against the page-global binding
    pub fn call_expression(&self) -> String {
        match self {
            DemuxerOp::GetMediaInfo => "demuxer.getMediaInfo()".to_string(),
            DemuxerOp::SeekMediaPacket {
                kind,
                stream_index,
                target,
            } => format!(
                "demuxer.seekMediaPacket({}, {}, {})",
                js_literal(&Value::from(kind.as_str())),
                stream_index,
                js_literal(&Value::from(*target)),
            ),
        }
    }
}

fn js_literal(value: &Value) -> String {
    // JSON literals are valid JS; serde_json escapes quotes in strings
    value.to_string()
}

/// A routine bound to one input element and one operation
#[derive(Debug, Clone, PartialEq)]
pub struct InPageRoutine {
    pub input_selector: String,
    pub op: DemuxerOp,
}

const ROUTINE_TEMPLATE: &str = r#"(async () => {
  const materialize = (value) => {
    if (value instanceof ArrayBuffer) return Array.from(new Uint8Array(value));
    if (ArrayBuffer.isView(value)) {
      return Array.from(new Uint8Array(value.buffer, value.byteOffset, value.byteLength));
    }
    if (Array.isArray(value)) return value.map(materialize);
    if (value && typeof value === 'object') {
      const out = {};
      for (const [key, inner] of Object.entries(value)) out[key] = materialize(inner);
      return out;
    }
    return value;
  };
  const fail = (stage, error) => ({
    ok: false,
    stage,
    message: error && error.message !== undefined ? String(error.message) : String(error),
    stack: error && error.stack ? String(error.stack) : null,
  });
  const input = document.querySelector(__SELECTOR__);
  const file = input && input.files ? input.files[0] : undefined;
  if (!file) return fail('bind', new Error('no file bound to ' + __SELECTOR__));
  const demuxer = window.demuxer;
  if (!demuxer) return fail('load', new Error('window.demuxer is not defined'));
  try {
    await demuxer.load(file);
  } catch (error) {
    return fail('load', error);
  }
  let value;
  try {
    value = await __CALL__;
  } catch (error) {
    return fail('read', error);
  }
  if (value === undefined || value === null) {
    return fail('read', new Error('operation returned no result'));
  }
  const buffer = value.data && value.data.buffer;
  return {
    ok: true,
    stage: 'read',
    value: materialize(value),
    backingByteLength: buffer && typeof buffer.byteLength === 'number' ? buffer.byteLength : null,
  };
})()"#;

impl InPageRoutine {
    pub fn new(input_selector: impl Into<String>, op: DemuxerOp) -> Self {
        Self {
            input_selector: input_selector.into(),
            op,
        }
    }

    /// Renders the routine as a self-invoking async expression
    pub fn to_script(&self) -> String {
        ROUTINE_TEMPLATE
            .replace("__SELECTOR__", &js_literal(&Value::from(self.input_selector.as_str())))
            .replace("__CALL__", &self.op.call_expression())
    }
}

/// Where the routine stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineStage {
    Bind,
    Load,
    Read,
}

/// What the routine hands back across the page boundary
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineEnvelope {
    pub ok: bool,
    pub stage: RoutineStage,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub backing_byte_length: Option<u64>,
}

impl RoutineEnvelope {
    /// Successful envelope, as the page builds it
    pub fn success(value: Value, backing_byte_length: Option<u64>) -> Self {
        Self {
            ok: true,
            stage: RoutineStage::Read,
            value: Some(value),
            message: None,
            stack: None,
            backing_byte_length,
        }
    }

    pub fn failure(stage: RoutineStage, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            stage,
            value: None,
            message: Some(message.into()),
            stack: None,
            backing_byte_length: None,
        }
    }

    /// Wire form of the envelope
    pub fn to_value(&self) -> Value {
        let stage = match self.stage {
            RoutineStage::Bind => "bind",
            RoutineStage::Load => "load",
            RoutineStage::Read => "read",
        };
        let mut out = serde_json::json!({ "ok": self.ok, "stage": stage });
        if let Some(value) = &self.value {
            out["value"] = value.clone();
        }
        if let Some(message) = &self.message {
            out["message"] = Value::from(message.as_str());
        }
        if let Some(stack) = &self.stack {
            out["stack"] = Value::from(stack.as_str());
        }
        if let Some(len) = self.backing_byte_length {
            out["backingByteLength"] = Value::from(len);
        }
        out
    }
}
