use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: i64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    Car,
    Boat,
    Bicycle,
    Motorcycle,
    Hoverboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FuelType {
    Gasoline,
    Kerosene,
    Electricity,
    Manpower,
    Nuclear,
}

/// Collection element. Opaque to the protocol engine: it is carried inside
/// requests during a follow-up exchange and inside response `data` items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Positive, unique, assigned by the server on insert.
    pub id: i64,
    pub name: String,
    pub coordinates: Coordinates,
    pub creation_date: DateTime<Utc>,
    /// Strictly positive.
    pub engine_power: f32,
    pub vehicle_type: VehicleType,
    pub fuel_type: FuelType,
}

impl Vehicle {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        coordinates: Coordinates,
        engine_power: f32,
        vehicle_type: VehicleType,
        fuel_type: FuelType,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            coordinates,
            creation_date: Utc::now(),
            engine_power,
            vehicle_type,
            fuel_type,
        }
    }

    /// Field-level validation, applied server-side before a vehicle enters
    /// the collection.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("vehicle name must not be empty".into());
        }
        if self.engine_power <= 0.0 {
            return Err("engine power must be positive".into());
        }
        Ok(())
    }
}

impl std::fmt::Display for Vehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{id={}, name={}, x={}, y={}, created={}, power={}, type={:?}, fuel={:?}}}",
            self.id,
            self.name,
            self.coordinates.x,
            self.coordinates.y,
            self.creation_date.format("%Y-%m-%d %H:%M"),
            self.engine_power,
            self.vehicle_type,
            self.fuel_type,
        )
    }
}
