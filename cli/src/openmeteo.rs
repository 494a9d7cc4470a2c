use anyhow::{Context, Result};

use larder_core::weather::{
    Coordinates, DailyForecast, ForecastResponse, ReverseGeocodeResponse, WeatherError,
    WeatherSource,
};

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

const DAILY_FIELDS: &str = "weathercode,temperature_2m_max,temperature_2m_min,precipitation_sum,windspeed_10m_max,precipitation_probability_max";

/// Open-Meteo forecasts plus Nominatim place names. Location comes from
/// configuration; there is no device geolocation on the command line.
pub struct OpenMeteoClient {
    client: reqwest::Client,
    location: Option<Coordinates>,
}

impl OpenMeteoClient {
    pub fn new(location: Option<Coordinates>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "larder-cli/{} (household dashboard)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, location })
    }

    pub async fn forecast_async(&self, coords: Coordinates) -> Result<DailyForecast> {
        let resp = self
            .client
            .get(FORECAST_URL)
            .query(&forecast_query(coords))
            .send()
            .await
            .context("Failed to reach Open-Meteo API")?
            .error_for_status()
            .context("Open-Meteo returned an error")?;

        let data: ForecastResponse = resp
            .json()
            .await
            .context("Failed to parse Open-Meteo forecast response")?;
        Ok(data.daily)
    }

    pub async fn reverse_geocode_async(&self, coords: Coordinates) -> Result<String> {
        let resp = self
            .client
            .get(REVERSE_URL)
            .query(&[
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await
            .context("Failed to reach Nominatim")?
            .error_for_status()
            .context("Nominatim returned an error")?;

        let data: ReverseGeocodeResponse = resp
            .json()
            .await
            .context("Failed to parse Nominatim response")?;
        Ok(data.place_name())
    }
}

fn forecast_query(coords: Coordinates) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", coords.latitude.to_string()),
        ("longitude", coords.longitude.to_string()),
        ("daily", DAILY_FIELDS.to_string()),
        ("temperature_unit", "fahrenheit".to_string()),
        ("wind_speed_unit", "mph".to_string()),
        ("precipitation_unit", "inch".to_string()),
        ("timezone", "auto".to_string()),
        ("forecast_days", "7".to_string()),
    ]
}

impl WeatherSource for OpenMeteoClient {
    async fn locate(&self) -> Result<Coordinates, WeatherError> {
        self.location.ok_or(WeatherError::LocationDenied)
    }

    async fn forecast(&self, coords: Coordinates) -> Result<DailyForecast, WeatherError> {
        self.forecast_async(coords)
            .await
            .map_err(|e| WeatherError::fetch_failed(&e))
    }

    async fn place_name(&self, coords: Coordinates) -> Result<String> {
        self.reverse_geocode_async(coords).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUSTIN: Coordinates = Coordinates {
        latitude: 30.27,
        longitude: -97.74,
    };

    #[test]
    fn test_forecast_query_params() {
        let q = forecast_query(AUSTIN);
        let get = |k: &str| {
            q.iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("latitude"), Some("30.27"));
        assert_eq!(get("longitude"), Some("-97.74"));
        assert_eq!(get("temperature_unit"), Some("fahrenheit"));
        assert_eq!(get("wind_speed_unit"), Some("mph"));
        assert_eq!(get("precipitation_unit"), Some("inch"));
        assert_eq!(get("forecast_days"), Some("7"));
        assert!(get("daily").unwrap().contains("precipitation_probability_max"));
    }

    #[tokio::test]
    async fn test_locate_without_configured_coordinates() {
        let client = OpenMeteoClient::new(None).unwrap();
        assert_eq!(client.locate().await, Err(WeatherError::LocationDenied));
        let client = OpenMeteoClient::new(Some(AUSTIN)).unwrap();
        assert_eq!(client.locate().await, Ok(AUSTIN));
    }

    #[tokio::test]
    #[ignore = "requires network access to api.open-meteo.com"]
    async fn test_live_forecast() {
        let client = OpenMeteoClient::new(Some(AUSTIN)).unwrap();
        let daily = client.forecast_async(AUSTIN).await.unwrap();
        assert_eq!(daily.time.len(), 7);
    }
}
