//! Built-in command handlers backing the server binary.
//!
//! These are deliberately thin: parse the argument, touch the collection,
//! answer. Commands that need a vehicle answer with `requires_vehicle` until
//! the client resubmits with one attached.

use std::sync::Arc;

use serde_json::json;

use crate::protocol::{Request, Response};
use crate::server::CommandHandler;

use super::collection::VehicleCollection;

fn parse_key(request: &Request) -> Result<i64, Response> {
    match request.argument.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw
            .parse::<i64>()
            .map_err(|_| Response::error(format!("key '{}' is not an integer", raw))),
        _ => Err(Response::error("this command needs a key argument")),
    }
}

pub struct HelpHandler {
    text: String,
}

impl HelpHandler {
    /// `entries` comes from the registry plus the dispatcher-level verbs.
    pub fn new(entries: Vec<(String, String)>) -> Self {
        let mut lines: Vec<String> = vec![
            "login : authenticate an existing account".into(),
            "register : create an account and log in".into(),
            "exit : close the client".into(),
        ];
        lines.extend(
            entries
                .into_iter()
                .map(|(name, description)| format!("{} : {}", name, description)),
        );
        Self {
            text: lines.join("\n"),
        }
    }
}

impl CommandHandler for HelpHandler {
    fn execute(&self, _request: &Request) -> anyhow::Result<Response> {
        Ok(Response::success(self.text.clone()))
    }
    fn description(&self) -> &str {
        "list available commands"
    }
}

pub struct InsertHandler {
    pub collection: Arc<VehicleCollection>,
}

impl CommandHandler for InsertHandler {
    fn execute(&self, request: &Request) -> anyhow::Result<Response> {
        let key = match parse_key(request) {
            Ok(key) => key,
            Err(response) => return Ok(response),
        };
        let Some(vehicle) = request.vehicle.clone() else {
            return Ok(Response::needs_vehicle(format!(
                "insert {} needs a vehicle",
                key
            )));
        };
        Ok(match self.collection.insert(key, vehicle) {
            Ok(stored) => Response::success(format!("inserted {} under key {}", stored.name, key)),
            Err(reason) => Response::error(reason),
        })
    }
    fn description(&self) -> &str {
        "insert <key> : add a vehicle under the given key"
    }
}

pub struct UpdateHandler {
    pub collection: Arc<VehicleCollection>,
}

impl CommandHandler for UpdateHandler {
    fn execute(&self, request: &Request) -> anyhow::Result<Response> {
        let key = match parse_key(request) {
            Ok(key) => key,
            Err(response) => return Ok(response),
        };
        let Some(vehicle) = request.vehicle.clone() else {
            return Ok(Response::needs_vehicle(format!(
                "update {} needs a vehicle",
                key
            )));
        };
        Ok(match self.collection.update(key, vehicle) {
            Ok(stored) => Response::success(format!("updated key {} ({})", key, stored.name)),
            Err(reason) => Response::error(reason),
        })
    }
    fn description(&self) -> &str {
        "update <key> : replace the vehicle under the given key"
    }
}

pub struct ShowHandler {
    pub collection: Arc<VehicleCollection>,
}

impl CommandHandler for ShowHandler {
    fn execute(&self, _request: &Request) -> anyhow::Result<Response> {
        let items = self.collection.all();
        if items.is_empty() {
            return Ok(Response::success("collection is empty"));
        }
        let data = items
            .iter()
            .map(|(key, vehicle)| -> anyhow::Result<serde_json::Value> {
                let mut value = serde_json::to_value(vehicle)?;
                if let Some(map) = value.as_object_mut() {
                    map.insert("key".into(), json!(key));
                }
                Ok(value)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Response::success_with_data(
            format!("{} vehicle(s)", data.len()),
            data,
        ))
    }
    fn description(&self) -> &str {
        "show : list every vehicle in the collection"
    }
}

pub struct RemoveHandler {
    pub collection: Arc<VehicleCollection>,
}

impl CommandHandler for RemoveHandler {
    fn execute(&self, request: &Request) -> anyhow::Result<Response> {
        let key = match parse_key(request) {
            Ok(key) => key,
            Err(response) => return Ok(response),
        };
        Ok(match self.collection.remove(key) {
            Some(vehicle) => Response::success(format!("removed {} (key {})", vehicle.name, key)),
            None => Response::error(format!("no vehicle under key {}", key)),
        })
    }
    fn description(&self) -> &str {
        "remove <key> : delete the vehicle under the given key"
    }
}

pub struct ClearHandler {
    pub collection: Arc<VehicleCollection>,
}

impl CommandHandler for ClearHandler {
    fn execute(&self, _request: &Request) -> anyhow::Result<Response> {
        let removed = self.collection.clear();
        Ok(Response::success(format!("removed {} vehicle(s)", removed)))
    }
    fn description(&self) -> &str {
        "clear : empty the collection"
    }
}

pub struct InfoHandler {
    pub collection: Arc<VehicleCollection>,
}

impl CommandHandler for InfoHandler {
    fn execute(&self, _request: &Request) -> anyhow::Result<Response> {
        Ok(Response::success(format!(
            "type: BTreeMap<i64, Vehicle>\ncreated: {}\nsize: {}",
            self.collection.created_at().format("%Y-%m-%d %H:%M:%S %Z"),
            self.collection.len()
        )))
    }
    fn description(&self) -> &str {
        "info : collection type, creation time and size"
    }
}
