//! Terminal presentation of sync events.

use console::style;
use transitwatch::error::CycleErrorKind;
use transitwatch::metrics::SyncSnapshot;
use transitwatch::scheduler::{PollMode, PollSession};
use transitwatch::TrackedVehicle;

/// Human-readable walking distance.
pub fn format_distance(meters: Option<u32>) -> String {
    match meters {
        None => "-".to_string(),
        Some(m) if m < 1000 => format!("{} m", m),
        Some(m) => format!("{:.1} km", m as f64 / 1000.0),
    }
}

/// Human-readable walking ETA.
pub fn format_eta(minutes: Option<u32>) -> String {
    match minutes {
        None => "-".to_string(),
        Some(0) => "<1 min".to_string(),
        Some(m) if m < 60 => format!("{} min", m),
        Some(m) => format!("{} h {} min", m / 60, m % 60),
    }
}

/// One table row for `vehicle`.
pub fn vehicle_row(vehicle: &TrackedVehicle) -> String {
    format!(
        "{:<12} {:<10} {:>22} {:>9} {:>10}",
        vehicle.id,
        vehicle.icon,
        vehicle.position.to_string(),
        format_distance(vehicle.distance_meters),
        format_eta(vehicle.eta_minutes)
    )
}

/// Print the session header.
pub fn session_started(session: &PollSession) {
    let what = match &session.mode {
        PollMode::All => "all vehicles".to_string(),
        PollMode::Single(id) => format!("vehicle {}", id),
    };
    println!(
        "{} {} every {} ms (session {})",
        style("Watching").green().bold(),
        what,
        session.interval.as_millis(),
        session.id
    );
}

/// Print the current registry snapshot.
pub fn vehicles(vehicles: &[TrackedVehicle]) {
    println!();
    println!(
        "{}",
        style(format!(
            "{:<12} {:<10} {:>22} {:>9} {:>10}",
            "VEHICLE", "MODE", "POSITION", "DISTANCE", "WALK"
        ))
        .bold()
    );
    if vehicles.is_empty() {
        println!("{}", style("(no vehicles)").dim());
    }
    for vehicle in vehicles {
        println!("{}", vehicle_row(vehicle));
    }
}

/// Print a non-fatal cycle failure.
pub fn cycle_error(kind: CycleErrorKind, detail: &str) {
    let status = style(kind.display_status()).yellow().bold();
    println!("{} {}", status, style(detail).dim());
}

/// Print a notice.
pub fn notice(message: &str) {
    println!("{} {}", style("::").cyan(), message);
}

/// Print the end-of-session summary.
pub fn summary(snapshot: &SyncSnapshot) {
    println!();
    println!("Session Summary");
    println!("───────────────");
    println!(
        "  Cycles:   {} started, {} applied, {} failed, {} waiting for location",
        snapshot.cycles_started,
        snapshot.cycles_applied,
        snapshot.cycles_failed,
        snapshot.cycles_pending
    );
    println!(
        "  Vehicles: {} updates, {} removed, {} invalid entries skipped",
        snapshot.vehicles_upserted, snapshot.vehicles_removed, snapshot.invalid_entries
    );
    if snapshot.stale_results_dropped > 0 {
        println!(
            "  Discarded {} results from superseded sessions",
            snapshot.stale_results_dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(None), "-");
        assert_eq!(format_distance(Some(556)), "556 m");
        assert_eq!(format_distance(Some(1232)), "1.2 km");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(None), "-");
        assert_eq!(format_eta(Some(0)), "<1 min");
        assert_eq!(format_eta(Some(15)), "15 min");
        assert_eq!(format_eta(Some(75)), "1 h 15 min");
    }
}
