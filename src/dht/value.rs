//! Stored value module
//!
//! A value is an opaque payload plus the small amount of metadata the store
//! engine needs. On the HTTP side it is exchanged as a JSON document:
//!
//! ```json
//! {"id": "8349023", "type": 0, "seq": 0, "data": "aGVsbG8=", "utype": "text/plain"}
//! ```
//!
//! `id` travels as a decimal string (it is a 64-bit integer) but numbers are
//! accepted on input. `data` is standard base64. Unknown members are ignored.

use crate::error::ProxyError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Reserved id meaning "let the store pick one"
pub const INVALID_ID: u64 = 0;

/// A value stored under a key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    /// Identifier, unique per key
    pub id: u64,
    /// Application-level type tag
    pub value_type: u16,
    /// Sequence number; a newer value with the same id must not go backwards
    pub seq: u16,
    /// Payload
    pub data: Vec<u8>,
    /// Free-form user type (e.g. a MIME type)
    pub user_type: String,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(u64),
    Text(String),
}

#[derive(Serialize, Deserialize)]
struct WireValue {
    #[serde(default)]
    id: Option<WireId>,
    #[serde(rename = "type", default)]
    value_type: u16,
    #[serde(default)]
    seq: u16,
    #[serde(default)]
    data: String,
    #[serde(rename = "utype", default, skip_serializing_if = "String::is_empty")]
    user_type: String,
}

impl Value {
    /// Create a value holding `data`, with an id to be assigned by the store
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Build a value from a request document
    pub fn from_json(doc: &serde_json::Value) -> Result<Self, ProxyError> {
        if !doc.is_object() {
            return Err(ProxyError::parse_error("Value document must be a JSON object"));
        }
        let wire: WireValue = serde_json::from_value(doc.clone())?;
        let id = match wire.id {
            None => INVALID_ID,
            Some(WireId::Number(id)) => id,
            Some(WireId::Text(text)) => text.parse::<u64>().map_err(|_| {
                ProxyError::validation_error_with_field(format!("Invalid value id '{}'", text), "id")
            })?,
        };
        Ok(Self {
            id,
            value_type: wire.value_type,
            seq: wire.seq,
            data: STANDARD.decode(wire.data.as_bytes())?,
            user_type: wire.user_type,
        })
    }

    /// JSON document for this value
    pub fn to_json(&self) -> serde_json::Value {
        let wire = WireValue {
            id: Some(WireId::Text(self.id.to_string())),
            value_type: self.value_type,
            seq: self.seq,
            data: STANDARD.encode(&self.data),
            user_type: self.user_type.clone(),
        };
        // A struct of plain fields always converts.
        serde_json::to_value(wire).unwrap_or(serde_json::Value::Null)
    }

    /// Compact JSON followed by a newline, the unit of every proxy body
    pub fn to_json_line(&self) -> String {
        let mut line = self.to_json().to_string();
        line.push('\n');
        line
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value[id:{:x} seq:{} type:{}", self.id, self.seq, self.value_type)?;
        if !self.user_type.is_empty() {
            write!(f, " utype:{}", self.user_type)?;
        }
        write!(f, " data:{} bytes]", self.data.len())
    }
}
