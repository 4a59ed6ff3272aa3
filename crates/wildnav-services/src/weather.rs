//! Current-weather client (Open-Meteo-style API) and the severe
//! condition table driving session weather alerts.

use crate::fetch::{FetchError, ResilientClient};
use async_trait::async_trait;
use serde::Deserialize;
use wildnav_core::models::GeoPoint;

/// Current conditions at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentWeather {
    pub temperature_c: f64,
    /// WMO weather interpretation code.
    pub condition_code: u16,
    pub wind_kmh: f64,
    pub is_day: bool,
}

impl CurrentWeather {
    /// Message for severe conditions, None otherwise.
    pub fn severe_message(&self) -> Option<&'static str> {
        severe_message(self.condition_code)
    }
}

/// WMO code groups considered severe enough to alert on.
pub fn severe_message(code: u16) -> Option<&'static str> {
    match code {
        95 | 96 | 99 => Some("Thunderstorm in your area. Seek solid shelter and avoid open ground."),
        65 | 82 => Some("Heavy rain ahead. Expect poor visibility and slippery terrain."),
        66 | 67 => Some("Freezing rain ahead. Surfaces may ice over."),
        75 | 86 => Some("Heavy snowfall ahead. Trails may become impassable."),
        _ => None,
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, point: GeoPoint) -> Result<CurrentWeather, FetchError>;
}

pub struct WeatherClient {
    fetch: ResilientClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    current_weather: CurrentWeatherDto,
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherDto {
    temperature: f64,
    weathercode: u16,
    windspeed: f64,
    is_day: u8,
}

impl WeatherClient {
    pub fn new(fetch: ResilientClient, base_url: impl Into<String>) -> Self {
        Self {
            fetch,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    async fn current(&self, point: GeoPoint) -> Result<CurrentWeather, FetchError> {
        let url = format!("{}/v1/forecast", self.base_url);
        let response: WeatherResponse = self
            .fetch
            .get_json(
                &url,
                &[
                    ("latitude", point.lat.to_string()),
                    ("longitude", point.lon.to_string()),
                    ("current_weather", "true".to_string()),
                ],
            )
            .await?;

        Ok(CurrentWeather {
            temperature_c: response.current_weather.temperature,
            condition_code: response.current_weather.weathercode,
            wind_kmh: response.current_weather.windspeed,
            is_day: response.current_weather.is_day != 0,
        })
    }
}
