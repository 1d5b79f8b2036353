//! Distance command - walking distance and ETA between two points.

use transitwatch::config::ConfigFile;
use transitwatch::geo::compute_distance_and_eta;

use super::track::parse_position;
use crate::error::CliError;
use crate::render::{format_distance, format_eta};

/// Arguments for the distance command.
pub struct DistanceArgs {
    pub from_lat: f64,
    pub from_lon: f64,
    pub to_lat: f64,
    pub to_lon: f64,
    pub speed: Option<f64>,
}

/// Run the distance command.
pub fn run(args: DistanceArgs, config: &ConfigFile) -> Result<(), CliError> {
    let from = parse_position(args.from_lat, args.from_lon)?;
    let to = parse_position(args.to_lat, args.to_lon)?;

    let speed = args.speed.unwrap_or(config.walking.speed_mps);
    if !(speed.is_finite() && speed > 0.0) {
        return Err(CliError::Config(format!(
            "walking speed must be positive, got {}",
            speed
        )));
    }

    let result = compute_distance_and_eta(from, to, speed);

    println!("From:     {}", from);
    println!("To:       {}", to);
    println!(
        "Distance: {} ({} m)",
        format_distance(Some(result.distance_meters)),
        result.distance_meters
    );
    println!(
        "Walking:  {} at {} m/s",
        format_eta(Some(result.eta_minutes)),
        speed
    );

    Ok(())
}
