//! Demo command set: an in-memory vehicle collection and the handlers the
//! server binary registers. Real deployments swap this module for their own
//! `CommandHandler` implementations.

pub mod collection;
pub mod handlers;

pub use collection::VehicleCollection;

use std::sync::Arc;

use crate::server::CommandRegistry;

use handlers::{
    ClearHandler, HelpHandler, InfoHandler, InsertHandler, RemoveHandler, ShowHandler,
    UpdateHandler,
};

/// Build the standard registry over one shared collection. `help` is
/// generated from the other handlers' descriptions, so it is registered last.
pub fn standard_registry(collection: Arc<VehicleCollection>) -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(
        "insert",
        Arc::new(InsertHandler {
            collection: collection.clone(),
        }),
    );
    registry.register(
        "update",
        Arc::new(UpdateHandler {
            collection: collection.clone(),
        }),
    );
    registry.register(
        "show",
        Arc::new(ShowHandler {
            collection: collection.clone(),
        }),
    );
    registry.register(
        "remove",
        Arc::new(RemoveHandler {
            collection: collection.clone(),
        }),
    );
    registry.register(
        "clear",
        Arc::new(ClearHandler {
            collection: collection.clone(),
        }),
    );
    registry.register("info", Arc::new(InfoHandler { collection }));
    let help = HelpHandler::new(registry.descriptions());
    registry.register("help", Arc::new(help));
    registry
}
