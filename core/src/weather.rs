//! Seven-day forecast types and the fetch cooldown cache.
//!
//! The wire types mirror the Open-Meteo daily forecast and Nominatim
//! reverse-geocoding responses. HTTP lives behind [`WeatherSource`].

use std::future::Future;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const CACHE_TTL_MINUTES: i64 = 15;
pub const FALLBACK_PLACE: &str = "Your Location";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Column-oriented daily forecast, one entry per day in each vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyForecast {
    pub time: Vec<String>,
    pub weathercode: Vec<Option<i32>>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
    pub precipitation_sum: Vec<Option<f64>>,
    pub windspeed_10m_max: Vec<Option<f64>>,
    pub precipitation_probability_max: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub daily: DailyForecast,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReverseGeocodeResponse {
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Default, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub county: Option<String>,
}

impl ReverseGeocodeResponse {
    /// Most specific place available: city, town, village, then county.
    #[must_use]
    pub fn place_name(&self) -> String {
        let a = &self.address;
        [&a.city, &a.town, &a.village, &a.county]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or(FALLBACK_PLACE)
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub label: &'static str,
    pub emoji: &'static str,
}

/// WMO weather interpretation code.
#[must_use]
pub fn condition(code: Option<i32>) -> Condition {
    let (label, emoji) = match code {
        Some(0) => ("Clear Sky", "☀️"),
        Some(1) => ("Mainly Clear", "🌤️"),
        Some(2) => ("Partly Cloudy", "⛅"),
        Some(3) => ("Overcast", "☁️"),
        Some(45 | 48) => ("Foggy", "🌫️"),
        Some(51 | 53 | 55) => ("Drizzle", "🌦️"),
        Some(61 | 63 | 65) => ("Rain", "🌧️"),
        Some(71 | 73 | 75 | 77) => ("Snow", "❄️"),
        Some(80..=82) => ("Rain Showers", "🌧️"),
        Some(85 | 86) => ("Snow Showers", "🌨️"),
        Some(95 | 96 | 99) => ("Thunderstorm", "⛈️"),
        _ => ("Unknown", "🌡️"),
    };
    Condition { label, emoji }
}

/// "Today", "Tomorrow", then e.g. "Wednesday, Oct 21".
#[must_use]
pub fn day_label(date: NaiveDate, index: usize) -> String {
    match index {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%A, %b %-d").to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastDay {
    pub date: String,
    pub label: String,
    pub code: Option<i32>,
    pub condition: Condition,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub precipitation: Option<f64>,
    pub precipitation_chance: Option<f64>,
    pub wind_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub forecast: DailyForecast,
}

impl WeatherReport {
    /// Row view of the forecast. Days whose date does not parse keep the raw
    /// string as their label.
    #[must_use]
    pub fn days(&self) -> Vec<ForecastDay> {
        let f = &self.forecast;
        let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();
        f.time
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let code = f.weathercode.get(i).copied().flatten();
                let label = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_or_else(|_| date.clone(), |d| day_label(d, i));
                ForecastDay {
                    date: date.clone(),
                    label,
                    code,
                    condition: condition(code),
                    high: at(&f.temperature_2m_max, i),
                    low: at(&f.temperature_2m_min, i),
                    precipitation: at(&f.precipitation_sum, i),
                    precipitation_chance: at(&f.precipitation_probability_max, i),
                    wind_max: at(&f.windspeed_10m_max, i),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeatherError {
    #[error("Location access was denied. Please allow location access and refresh.")]
    LocationDenied,
    #[error("Could not load weather data. Please try again.")]
    FetchFailed { detail: String },
}

impl WeatherError {
    pub fn fetch_failed(err: &anyhow::Error) -> Self {
        WeatherError::FetchFailed {
            detail: format!("{err:#}"),
        }
    }
}

/// Where coordinates, forecasts and place names come from.
pub trait WeatherSource: Send + Sync {
    fn locate(&self) -> impl Future<Output = Result<Coordinates, WeatherError>> + Send;

    fn forecast(
        &self,
        coords: Coordinates,
    ) -> impl Future<Output = Result<DailyForecast, WeatherError>> + Send;

    fn place_name(&self, coords: Coordinates) -> impl Future<Output = anyhow::Result<String>> + Send;
}

/// Last successful fetch, reused for [`CACHE_TTL_MINUTES`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherCache {
    pub coords: Option<Coordinates>,
    pub report: Option<WeatherReport>,
    pub last_fetched: Option<DateTime<Utc>>,
}

impl WeatherCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a report exists and was fetched less than the TTL ago.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.report, self.last_fetched) {
            (Some(_), Some(at)) => now - at < Duration::minutes(CACHE_TTL_MINUTES),
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Forget the fetch time so the next load goes to the network. Cached
    /// coordinates are kept.
    pub fn invalidate(&mut self) {
        self.last_fetched = None;
    }

    pub fn set_coordinates(&mut self, coords: Coordinates) {
        if self.coords != Some(coords) {
            self.coords = Some(coords);
            self.last_fetched = None;
        }
    }

    pub fn record(&mut self, report: WeatherReport, at: DateTime<Utc>) {
        self.report = Some(report);
        self.last_fetched = Some(at);
    }

    /// Cached report while fresh; otherwise locate (if needed), then fetch the
    /// forecast and place name together. A failed place lookup falls back to
    /// "Your Location". A failed load leaves the cache as it was, apart from
    /// newly resolved coordinates.
    pub async fn load<W: WeatherSource>(
        &mut self,
        source: &W,
        now: DateTime<Utc>,
    ) -> Result<WeatherReport, WeatherError> {
        if self.is_fresh(now) {
            if let Some(report) = &self.report {
                debug!("weather cache hit");
                return Ok(report.clone());
            }
        }

        let coords = match self.coords {
            Some(c) => c,
            None => {
                let c = source.locate().await?;
                self.coords = Some(c);
                c
            }
        };

        info!(
            latitude = coords.latitude,
            longitude = coords.longitude,
            "fetching forecast"
        );
        let (forecast, place) = tokio::join!(source.forecast(coords), source.place_name(coords));
        let forecast = forecast?;
        let location = match place {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => FALLBACK_PLACE.to_string(),
            Err(e) => {
                warn!(error = %e, "reverse geocoding failed");
                FALLBACK_PLACE.to_string()
            }
        };

        let report = WeatherReport { location, forecast };
        self.record(report.clone(), now);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    use super::*;

    struct FakeSource {
        forecasts: AtomicUsize,
        locates: AtomicUsize,
        deny: bool,
        fail_forecast: bool,
        fail_place: bool,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                forecasts: AtomicUsize::new(0),
                locates: AtomicUsize::new(0),
                deny: false,
                fail_forecast: false,
                fail_place: false,
            }
        }
    }

    impl WeatherSource for FakeSource {
        async fn locate(&self) -> Result<Coordinates, WeatherError> {
            self.locates.fetch_add(1, Ordering::SeqCst);
            if self.deny {
                return Err(WeatherError::LocationDenied);
            }
            Ok(Coordinates {
                latitude: 30.27,
                longitude: -97.74,
            })
        }

        async fn forecast(&self, _coords: Coordinates) -> Result<DailyForecast, WeatherError> {
            self.forecasts.fetch_add(1, Ordering::SeqCst);
            if self.fail_forecast {
                return Err(WeatherError::fetch_failed(&anyhow!("HTTP 503")));
            }
            Ok(sample_forecast())
        }

        async fn place_name(&self, _coords: Coordinates) -> anyhow::Result<String> {
            if self.fail_place {
                return Err(anyhow!("nominatim down"));
            }
            Ok("Austin".to_string())
        }
    }

    fn sample_forecast() -> DailyForecast {
        DailyForecast {
            time: vec![
                "2026-10-16".to_string(),
                "2026-10-17".to_string(),
                "2026-10-18".to_string(),
            ],
            weathercode: vec![Some(0), Some(63), None],
            temperature_2m_max: vec![Some(81.2), Some(75.0), Some(70.1)],
            temperature_2m_min: vec![Some(60.0), Some(58.3), None],
            precipitation_sum: vec![Some(0.0), Some(0.4), Some(0.0)],
            windspeed_10m_max: vec![Some(9.1), Some(14.0), Some(6.2)],
            precipitation_probability_max: vec![Some(0.0), Some(80.0), Some(10.0)],
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-16T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_two_loads_within_ttl_fetch_once() {
        let source = FakeSource::new();
        let mut cache = WeatherCache::new();
        let first = cache.load(&source, t0()).await.unwrap();
        let second = cache
            .load(&source, t0() + Duration::minutes(14))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(source.forecasts.load(Ordering::SeqCst), 1);
        assert_eq!(source.locates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_after_ttl_refetches() {
        let source = FakeSource::new();
        let mut cache = WeatherCache::new();
        cache.load(&source, t0()).await.unwrap();
        let later = t0() + Duration::minutes(16);
        cache.load(&source, later).await.unwrap();
        assert_eq!(source.forecasts.load(Ordering::SeqCst), 2);
        assert_eq!(source.locates.load(Ordering::SeqCst), 1);
        assert_eq!(cache.last_fetched, Some(later));
    }

    #[tokio::test]
    async fn test_location_denied_is_distinct() {
        let mut source = FakeSource::new();
        source.deny = true;
        let mut cache = WeatherCache::new();
        let err = cache.load(&source, t0()).await.unwrap_err();
        assert_eq!(err, WeatherError::LocationDenied);
        assert_eq!(
            err.to_string(),
            "Location access was denied. Please allow location access and refresh."
        );
        assert_eq!(source.forecasts.load(Ordering::SeqCst), 0);
        assert!(cache.report.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_generic_message() {
        let mut source = FakeSource::new();
        source.fail_forecast = true;
        let mut cache = WeatherCache::new();
        let err = cache.load(&source, t0()).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not load weather data. Please try again.");
        assert!(cache.last_fetched.is_none());
        assert!(cache.coords.is_some());
    }

    #[tokio::test]
    async fn test_place_failure_falls_back() {
        let mut source = FakeSource::new();
        source.fail_place = true;
        let mut cache = WeatherCache::new();
        let report = cache.load(&source, t0()).await.unwrap();
        assert_eq!(report.location, "Your Location");
    }

    #[tokio::test]
    async fn test_reset_and_invalidate() {
        let source = FakeSource::new();
        let mut cache = WeatherCache::new();
        cache.load(&source, t0()).await.unwrap();
        cache.invalidate();
        assert!(!cache.is_fresh(t0()));
        cache.load(&source, t0()).await.unwrap();
        assert_eq!(source.forecasts.load(Ordering::SeqCst), 2);
        assert_eq!(source.locates.load(Ordering::SeqCst), 1);

        cache.reset();
        assert_eq!(cache, WeatherCache::default());
    }

    #[test]
    fn test_set_coordinates_invalidates_on_change() {
        let mut cache = WeatherCache::new();
        let report = WeatherReport {
            location: "Austin".to_string(),
            forecast: sample_forecast(),
        };
        let here = Coordinates {
            latitude: 1.0,
            longitude: 2.0,
        };
        cache.set_coordinates(here);
        cache.record(report, t0());
        cache.set_coordinates(here);
        assert!(cache.is_fresh(t0()));
        cache.set_coordinates(Coordinates {
            latitude: 3.0,
            longitude: 4.0,
        });
        assert!(!cache.is_fresh(t0()));
    }

    #[test]
    fn test_condition_table() {
        assert_eq!(condition(Some(0)).label, "Clear Sky");
        assert_eq!(condition(Some(48)).label, "Foggy");
        assert_eq!(condition(Some(81)).label, "Rain Showers");
        assert_eq!(condition(Some(77)).label, "Snow");
        assert_eq!(condition(Some(99)).label, "Thunderstorm");
        assert_eq!(condition(Some(4)).label, "Unknown");
        assert_eq!(condition(None).label, "Unknown");
    }

    #[test]
    fn test_day_labels() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
        assert_eq!(day_label(d, 0), "Today");
        assert_eq!(day_label(d, 1), "Tomorrow");
        assert_eq!(day_label(d, 5), "Wednesday, Oct 21");
    }

    #[test]
    fn test_report_days() {
        let report = WeatherReport {
            location: "Austin".to_string(),
            forecast: sample_forecast(),
        };
        let days = report.days();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].label, "Today");
        assert_eq!(days[1].condition.label, "Rain");
        assert_eq!(days[1].precipitation_chance, Some(80.0));
        assert_eq!(days[2].label, "Sunday, Oct 18");
        assert_eq!(days[2].low, None);
    }

    #[test]
    fn test_place_name_fallback_chain() {
        let parsed: ReverseGeocodeResponse = serde_json::from_value(serde_json::json!({
            "address": {"village": "Wimberley", "county": "Hays County"}
        }))
        .unwrap();
        assert_eq!(parsed.place_name(), "Wimberley");

        let empty: ReverseGeocodeResponse =
            serde_json::from_value(serde_json::json!({"error": "Unable to geocode"})).unwrap();
        assert_eq!(empty.place_name(), "Your Location");
    }

    #[test]
    fn test_forecast_response_parses_nulls() {
        let json = serde_json::json!({
            "latitude": 30.25,
            "daily": {
                "time": ["2026-10-16"],
                "weathercode": [3],
                "temperature_2m_max": [null],
                "temperature_2m_min": [55.4],
                "precipitation_sum": [0.0],
                "windspeed_10m_max": [7.3],
                "precipitation_probability_max": [null]
            }
        });
        let parsed: ForecastResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.daily.weathercode, vec![Some(3)]);
        assert_eq!(parsed.daily.temperature_2m_max, vec![None]);
    }

    #[test]
    fn test_cache_persists_as_json() {
        let mut cache = WeatherCache::new();
        cache.record(
            WeatherReport {
                location: "Austin".to_string(),
                forecast: sample_forecast(),
            },
            t0(),
        );
        let text = serde_json::to_string(&cache).unwrap();
        let back: WeatherCache = serde_json::from_str(&text).unwrap();
        assert_eq!(back, cache);
        assert!(back.is_fresh(t0() + Duration::minutes(1)));
    }
}
