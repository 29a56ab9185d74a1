//! Domain payload types carried over the wire.

pub mod vehicle;

pub use vehicle::{Coordinates, FuelType, Vehicle, VehicleType};
