//! motorpool: client/server vehicle collection service.
//!
//! The interesting part is the protocol engine, not the commands: a
//! length-prefixed MessagePack framing codec ([`protocol`]), a tokio server
//! that keeps business logic off the I/O paths ([`server`]), and an
//! interactive reconnecting client ([`client`]). Command semantics and
//! credential storage are consumed through the [`server::CommandHandler`] and
//! [`server::Authenticator`] traits; [`commands`] ships an in-memory demo
//! implementation of both sides.

pub mod client;
pub mod commands;
pub mod model;
pub mod protocol;
pub mod server;
