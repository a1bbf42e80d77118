//! Result envelope printed by every unit of work

use crate::Result;
use serde::Serialize;
use serde_json::Value;

/// `{"status":"ok","payload":…}` or `{"status":"error","error_message":"…"}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope {
    Ok { payload: Value },
    Error { error_message: String },
}

impl Envelope {
    /// Wraps a unit's outcome, catching every error at the unit boundary
    pub fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result {
            Ok(payload) => match serde_json::to_value(payload) {
                Ok(payload) => Self::Ok { payload },
                Err(e) => Self::error(&e),
            },
            Err(e) => {
                tracing::error!("Unit failed ({:?}): {}", e.kind(), e);
                Self::error(&e)
            }
        }
    }

    pub fn error(error: &dyn std::fmt::Display) -> Self {
        Self::Error {
            error_message: error.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Single-line JSON form
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            // unreachable for Value payloads
            Err(_) => r#"{"status":"error","error_message":"unserializable result"}"#.to_string(),
        }
    }
}
