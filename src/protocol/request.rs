use serde::{Deserialize, Serialize};

use crate::model::Vehicle;

/// One client → server message.
///
/// `command` is always present (an empty string is a valid no-op). Credentials
/// ride along on every request once the session has authenticated, and
/// `vehicle` is attached only when the client resubmits a command that asked
/// for one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Vehicle>,
}

impl Request {
    pub fn new(command: impl Into<String>, argument: Option<String>) -> Self {
        Self {
            command: command.into(),
            argument,
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_vehicle(mut self, vehicle: Vehicle) -> Self {
        self.vehicle = Some(vehicle);
        self
    }
}
