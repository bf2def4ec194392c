//! Terminal rendering of dashboard snapshots

use std::fmt::Write;

use occupancy_fetcher::{NormalizedMeasurement, OccupancyStatus};
use refresh_scheduler::{DashboardSnapshot, RefreshInterval};

/// Crowd level derived from the person count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrowdLevel {
    Low,
    Medium,
    High,
}

impl CrowdLevel {
    pub fn from_count(person_count: u32) -> Self {
        if person_count > 10 {
            CrowdLevel::High
        } else if person_count > 5 {
            CrowdLevel::Medium
        } else {
            CrowdLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CrowdLevel::Low => "bajo",
            CrowdLevel::Medium => "medio",
            CrowdLevel::High => "alto",
        }
    }
}

/// Display label for a status; unrecognized values show as unknown
pub fn status_label(status: &OccupancyStatus) -> &'static str {
    match status {
        OccupancyStatus::Normal => "Normal",
        OccupancyStatus::Moderate => "Moderado",
        OccupancyStatus::Congested => "Congestionado",
        OccupancyStatus::Unknown(_) => "Desconocido",
    }
}

/// One line per measurement
pub fn render_measurement(measurement: &NormalizedMeasurement) -> String {
    let time = measurement
        .parsed_timestamp()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| measurement.timestamp.clone());
    let location = if measurement.location.is_sentinel() {
        "sin ubicación".to_string()
    } else {
        format!("{:.5},{:.5}", measurement.location.lat, measurement.location.lng)
    };

    format!(
        "{:<14} {:<13} {:>3} personas ({:<5}) {:>6.1}/{:<6.1} {} {} {}",
        measurement.stop_id,
        status_label(&measurement.status),
        measurement.person_count,
        CrowdLevel::from_count(measurement.person_count).label(),
        measurement.sensor1_distance,
        measurement.sensor2_distance,
        time,
        location,
        measurement.recommendation,
    )
}

/// Header line describing refresh mode and activity
pub fn render_status(snapshot: &DashboardSnapshot) -> String {
    let options: Vec<String> = RefreshInterval::ALL
        .iter()
        .map(|interval| {
            if *interval == snapshot.interval {
                format!("[{}]", interval.label())
            } else {
                interval.label().to_string()
            }
        })
        .collect();

    let mut line = format!("Actualización: {}", options.join(" "));
    if snapshot.is_loading {
        line.push_str(" | Cargando datos...");
    } else if snapshot.is_auto_updating {
        line.push_str(" | Actualizando...");
    } else if !snapshot.interval.is_manual() {
        let _ = write!(line, " | Próxima actualización en {}s", snapshot.countdown);
    }
    line
}

/// Full screen for a snapshot
pub fn render(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", render_status(snapshot));

    if let Some(error) = &snapshot.last_error {
        let _ = writeln!(out, "Error: {}", error);
    }

    if snapshot.measurements.is_empty() && !snapshot.is_loading {
        let _ = writeln!(out, "No hay mediciones disponibles.");
    }
    for measurement in snapshot.measurements.iter() {
        let _ = writeln!(out, "{}", render_measurement(measurement));
    }

    out.push_str("Comandos: 5 | 10 | 30 | m (manual) | r (recargar) | q (salir)");
    out
}
