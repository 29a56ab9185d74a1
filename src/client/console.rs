//! Console input as an independent event source.
//!
//! A dedicated thread owns the blocking stdin reads and feeds lines through a
//! channel, so the session loop can multiplex user input against socket I/O
//! with `select!` instead of alternating blocking reads.

use std::io::{BufRead, Write};

use tokio::sync::mpsc;

use crate::model::{Coordinates, FuelType, Vehicle, VehicleType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Line(String),
    /// stdin closed (^D or piped input exhausted).
    Eof,
}

pub struct Console {
    rx: mpsc::Receiver<ConsoleEvent>,
}

impl Console {
    /// Spawn the stdin reader thread. The thread exits when the session side
    /// drops the channel.
    pub fn spawn_stdin() -> Self {
        let (tx, rx) = mpsc::channel(16);
        std::thread::Builder::new()
            .name("stdin-reader".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let event = match line {
                        Ok(line) => ConsoleEvent::Line(line),
                        Err(_) => break,
                    };
                    if tx.blocking_send(event).is_err() {
                        return;
                    }
                }
                let _ = tx.blocking_send(ConsoleEvent::Eof);
            })
            .expect("spawn stdin reader");
        Self { rx }
    }

    /// Test seam: a console fed from a prepared channel.
    pub fn from_channel(rx: mpsc::Receiver<ConsoleEvent>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> ConsoleEvent {
        self.rx.recv().await.unwrap_or(ConsoleEvent::Eof)
    }
}

pub(crate) fn prompt(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

async fn read_field<T, F>(console: &mut Console, label: &str, parse: F) -> Option<T>
where
    F: Fn(&str) -> Result<T, String>,
{
    loop {
        prompt(label);
        match console.next().await {
            ConsoleEvent::Line(line) => match parse(line.trim()) {
                Ok(value) => return Some(value),
                Err(reason) => println!("{}", reason),
            },
            ConsoleEvent::Eof => return None,
        }
    }
}

pub(crate) fn parse_vehicle_type(raw: &str) -> Result<VehicleType, String> {
    match raw.to_ascii_lowercase().as_str() {
        "car" => Ok(VehicleType::Car),
        "boat" => Ok(VehicleType::Boat),
        "bicycle" => Ok(VehicleType::Bicycle),
        "motorcycle" => Ok(VehicleType::Motorcycle),
        "hoverboard" => Ok(VehicleType::Hoverboard),
        _ => Err("expected one of: car, boat, bicycle, motorcycle, hoverboard".into()),
    }
}

pub(crate) fn parse_fuel_type(raw: &str) -> Result<FuelType, String> {
    match raw.to_ascii_lowercase().as_str() {
        "gasoline" => Ok(FuelType::Gasoline),
        "kerosene" => Ok(FuelType::Kerosene),
        "electricity" => Ok(FuelType::Electricity),
        "manpower" => Ok(FuelType::Manpower),
        "nuclear" => Ok(FuelType::Nuclear),
        _ => Err("expected one of: gasoline, kerosene, electricity, manpower, nuclear".into()),
    }
}

/// Interactive vehicle form. Returns `None` on stdin EOF. The id is a
/// placeholder; the server assigns the real one.
pub async fn prompt_vehicle(console: &mut Console) -> Option<Vehicle> {
    println!("enter the vehicle:");
    let name = read_field(console, "  name: ", |raw| {
        if raw.is_empty() {
            Err("name must not be empty".into())
        } else {
            Ok(raw.to_string())
        }
    })
    .await?;
    let x = read_field(console, "  coordinate x (integer): ", |raw| {
        raw.parse::<i64>().map_err(|_| "expected an integer".into())
    })
    .await?;
    let y = read_field(console, "  coordinate y (number): ", |raw| {
        raw.parse::<f64>().map_err(|_| "expected a number".into())
    })
    .await?;
    let engine_power = read_field(console, "  engine power (> 0): ", |raw| {
        match raw.parse::<f32>() {
            Ok(power) if power > 0.0 => Ok(power),
            Ok(_) => Err("engine power must be positive".into()),
            Err(_) => Err("expected a number".into()),
        }
    })
    .await?;
    let vehicle_type = read_field(console, "  type: ", parse_vehicle_type).await?;
    let fuel_type = read_field(console, "  fuel: ", parse_fuel_type).await?;

    Some(Vehicle::new(
        0,
        name,
        Coordinates { x, y },
        engine_power,
        vehicle_type,
        fuel_type,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_reports_eof_when_the_feeder_is_gone() {
        let (tx, rx) = tokio::sync::mpsc::channel::<ConsoleEvent>(1);
        drop(tx);
        let mut console = Console::from_channel(rx);
        assert_eq!(tokio_test::block_on(console.next()), ConsoleEvent::Eof);
    }

    #[test]
    fn vehicle_type_parsing_is_case_insensitive() {
        assert_eq!(parse_vehicle_type("CAR").unwrap(), VehicleType::Car);
        assert!(parse_vehicle_type("submarine").is_err());
    }

    #[test]
    fn fuel_type_parsing() {
        assert_eq!(parse_fuel_type("nuclear").unwrap(), FuelType::Nuclear);
        assert!(parse_fuel_type("").is_err());
    }

    #[tokio::test]
    async fn form_collects_a_vehicle_from_scripted_input() {
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        for line in ["truck", "10", "2.5", "bad", "90", "car", "gasoline"] {
            tx.send(ConsoleEvent::Line(line.to_string())).await.unwrap();
        }
        let mut console = Console::from_channel(rx);
        let vehicle = prompt_vehicle(&mut console).await.unwrap();
        assert_eq!(vehicle.name, "truck");
        assert_eq!(vehicle.coordinates.x, 10);
        assert_eq!(vehicle.engine_power, 90.0);
    }

    #[tokio::test]
    async fn form_aborts_on_eof() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(ConsoleEvent::Line("truck".into())).await.unwrap();
        drop(tx);
        let mut console = Console::from_channel(rx);
        assert!(prompt_vehicle(&mut console).await.is_none());
    }
}
