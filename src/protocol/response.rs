use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::RemoteFault;

/// One server → client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub message: String,

    /// Ordered opaque items accompanying the message (e.g. listed vehicles).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteFault>,

    /// Protocol-level flag: resubmit the same command and argument with a
    /// vehicle attached. Not a business outcome.
    #[serde(default)]
    pub requires_vehicle: bool,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            exception: None,
            requires_vehicle: false,
        }
    }

    pub fn success_with_data(message: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            data: Some(data),
            ..Self::success(message)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            exception: None,
            requires_vehicle: false,
        }
    }

    /// Error response carrying a structured descriptor; `message` mirrors it
    /// so clients that only display text still see the cause.
    pub fn fault(fault: RemoteFault) -> Self {
        Self {
            success: false,
            message: fault.to_string(),
            data: None,
            exception: Some(fault),
            requires_vehicle: false,
        }
    }

    /// Ask the client to resubmit the same command with a vehicle attached.
    pub fn needs_vehicle(message: impl Into<String>) -> Self {
        Self {
            requires_vehicle: true,
            ..Self::success(message)
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.is_empty())
    }
}
