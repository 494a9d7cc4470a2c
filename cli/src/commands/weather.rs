use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::weather::{WeatherCache, WeatherError};

use crate::config::Config;
use crate::openmeteo::OpenMeteoClient;

use super::helpers::{or_dash, print_json};

/// An unreadable cache file is treated as empty.
pub(crate) fn load_cache(path: &Path) -> WeatherCache {
    let Ok(text) = std::fs::read_to_string(path) else {
        return WeatherCache::new();
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "discarding unreadable weather cache");
        WeatherCache::new()
    })
}

pub(crate) fn save_cache(path: &Path, cache: &WeatherCache) -> Result<()> {
    let text = serde_json::to_string(cache)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write weather cache: {}", path.display()))
}

pub(crate) async fn cmd_weather(config: &Config, refresh: bool, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Day")]
        label: String,
        #[tabled(rename = "Conditions")]
        condition: String,
        #[tabled(rename = "High °F")]
        high: String,
        #[tabled(rename = "Low °F")]
        low: String,
        #[tabled(rename = "Precip in")]
        precipitation: String,
        #[tabled(rename = "Chance %")]
        chance: String,
        #[tabled(rename = "Wind mph")]
        wind: String,
    }

    let path = config.weather_cache_path();
    let mut cache = load_cache(&path);
    if let Some(coords) = config.weather.coordinates() {
        cache.set_coordinates(coords);
    }
    if refresh {
        cache.invalidate();
    }

    let client = OpenMeteoClient::new(config.weather.coordinates())?;
    let report = match cache.load(&client, Utc::now()).await {
        Ok(r) => r,
        Err(WeatherError::LocationDenied) => bail!(
            "{}\nSet [weather] latitude and longitude in config.toml",
            WeatherError::LocationDenied
        ),
        Err(WeatherError::FetchFailed { detail }) => {
            tracing::warn!(detail = %detail, "weather fetch failed");
            bail!("{}", WeatherError::FetchFailed { detail });
        }
    };
    if let Err(e) = save_cache(&path, &cache) {
        tracing::warn!(error = %e, "weather cache not saved");
    }

    let days = report.days();
    if json {
        return print_json(&serde_json::json!({
            "location": report.location,
            "days": days,
        }));
    }

    println!("Weather for {}", report.location);
    let rows: Vec<DayRow> = days
        .iter()
        .map(|d| DayRow {
            label: d.label.clone(),
            condition: format!("{} {}", d.condition.emoji, d.condition.label),
            high: or_dash(d.high.map(|v| format!("{v:.0}"))),
            low: or_dash(d.low.map(|v| format!("{v:.0}"))),
            precipitation: or_dash(d.precipitation.map(|v| format!("{v:.2}"))),
            chance: or_dash(d.precipitation_chance.map(|v| format!("{v:.0}"))),
            wind: or_dash(d.wind_max.map(|v| format!("{v:.0}"))),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
