//! Table and text rendering for command output.

use crate::models::{LocationCoverage, LocationNormals, NormalsFailure, TwinsReport};
use chrono::Month;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn number(value: Option<f64>) -> Cell {
    let text = value.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v));
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn month_name(month: i32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map_or_else(|| month.to_string(), |m| m.name().to_string())
}

/// Colour for an overall similarity score.
fn score_color(score: u32) -> Color {
    match score {
        90..=100 => Color::Green,
        75..=89 => Color::Yellow,
        _ => Color::Red,
    }
}

pub fn failure_line(failure: &NormalsFailure) -> String {
    match failure.month {
        Some(month) => format!(
            "location {} {}: {}",
            failure.location_id,
            month_name(month),
            failure.reason
        ),
        None => format!("location {}: {}", failure.location_id, failure.reason),
    }
}

pub fn normals_table(normals: &LocationNormals) -> Table {
    let mut table = table();
    table.set_header(vec![
        "Month",
        "Avg high °C",
        "Avg low °C",
        "Record high",
        "Record low",
        "Precip mm",
        "Humidity %",
        "Wind km/h",
        "Sunny",
        "Rainy",
        "Snowy",
        "Years",
    ]);
    for n in &normals.months {
        table.add_row(vec![
            Cell::new(month_name(n.month)),
            number(n.avg_temp_high),
            number(n.avg_temp_low),
            number(n.record_high),
            number(n.record_low),
            number(n.avg_precipitation),
            number(n.avg_humidity),
            number(n.avg_wind_speed),
            Cell::new(n.sunny_day_count).set_alignment(CellAlignment::Right),
            Cell::new(n.rainy_day_count).set_alignment(CellAlignment::Right),
            Cell::new(n.snowy_day_count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{}-{}", n.source_year_start, n.source_year_end)),
        ]);
    }
    table
}

pub fn locations_table(locations: &[LocationCoverage]) -> Table {
    let mut table = table();
    table.set_header(vec!["Id", "Name", "Country", "Observations"]);
    for loc in locations {
        table.add_row(vec![
            Cell::new(loc.location_id),
            Cell::new(&loc.name),
            Cell::new(&loc.country_code),
            Cell::new(loc.observation_count).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn twins_headline(report: &TwinsReport) -> String {
    let reference = &report.reference;
    format!(
        "Weather twins for {} ({}) on {}: {:.1}°C, {}",
        reference.location_name,
        reference.country_code,
        report.metadata.date,
        reference.observation.temperature_avg.unwrap_or_default(),
        reference
            .observation
            .weather_condition
            .as_deref()
            .unwrap_or("unknown conditions")
    )
}

pub fn twins_table(report: &TwinsReport) -> Table {
    let mut table = table();
    table.set_header(vec![
        "#",
        "Location",
        "Country",
        "Avg °C",
        "Conditions",
        "Temp",
        "Humidity",
        "Precip",
        "Wind",
        "Cond",
        "Overall",
    ]);
    for (rank, twin) in report.twins.iter().enumerate() {
        let obs = &twin.conditions.observation;
        let s = &twin.scores;
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(&twin.location_name),
            Cell::new(&twin.country_code),
            number(obs.temperature_avg),
            Cell::new(obs.weather_condition.as_deref().unwrap_or("-")),
            number(Some(s.temperature)),
            number(Some(s.humidity)),
            number(Some(s.precipitation)),
            number(Some(s.wind)),
            number(Some(s.conditions)),
            Cell::new(s.overall)
                .fg(score_color(s.overall))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
