//! HTTP client for the weather proxy.

use std::time::Duration;

use aether_core::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::source::WeatherSource;
use crate::types::{AirQualitySnapshot, CityWeatherRecord, Coordinates, WeatherSnapshot};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct WeatherEnvelope {
    weather: WeatherSnapshot,
}

#[derive(Debug, Deserialize)]
struct AirQualityEnvelope {
    #[serde(rename = "airQuality")]
    air_quality: AirQualitySnapshot,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    /// Create a client for the proxy at `base_url`. `timeout` applies to each
    /// request separately.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current weather for a city, by name.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_weather(&self, city: &str) -> Result<WeatherSnapshot, FetchError> {
        let url = format!(
            "{}/api/weather?city={}",
            self.base_url,
            urlencoding::encode(city)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(city, &self.base_url, &e))?;

        let body: WeatherEnvelope = self.handle_response(city, response).await?;
        Ok(body.weather)
    }

    /// Air quality at the given coordinates. `city` only labels errors.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_air_quality(
        &self,
        city: &str,
        coord: Coordinates,
    ) -> Result<AirQualitySnapshot, FetchError> {
        let url = format!(
            "{}/api/air-quality?lat={}&lon={}",
            self.base_url, coord.lat, coord.lon
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(city, &self.base_url, &e))?;

        let body: AirQualityEnvelope = self.handle_response(city, response).await?;
        Ok(body.air_quality)
    }

    /// Weather by name, then air quality at the coordinates it returned.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_city_data(&self, city: &str) -> Result<CityWeatherRecord, FetchError> {
        let weather = self.fetch_weather(city).await?;
        let air_quality = self.fetch_air_quality(city, weather.coord).await?;

        tracing::debug!("Fetched weather and air quality for {}", city);
        Ok(CityWeatherRecord {
            weather,
            air_quality: Some(air_quality),
        })
    }

    /// Check whether the proxy is up.
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Health check request failed")?;
        Ok(response.status().is_success())
    }

    /// Decode a success body, or turn an error status into `FetchError::Server`.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        city: &str,
        response: reqwest::Response,
    ) -> Result<T, FetchError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| FetchError::from_reqwest(city, &self.base_url, &e));
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown status")
                    .to_string()
            });

        tracing::warn!("Proxy returned {} for {}: {}", status, city, message);
        Err(FetchError::Server {
            city: city.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch_city_data(&self, city: &str) -> Result<CityWeatherRecord, FetchError> {
        WeatherClient::fetch_city_data(self, city).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn weather_body(name: &str) -> serde_json::Value {
        serde_json::json!({
            "weather": {
                "coord": {"lon": 126.98, "lat": 37.57},
                "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
                "main": {
                    "temp": 14.2, "feels_like": 13.5, "temp_min": 12.0, "temp_max": 15.1,
                    "pressure": 1012, "humidity": 81
                },
                "wind": {"speed": 4.1},
                "timezone": 32400,
                "name": name
            }
        })
    }

    fn air_body() -> serde_json::Value {
        serde_json::json!({
            "airQuality": {
                "list": [{"main": {"aqi": 3}, "components": {"pm2_5": 30.5, "pm10": 41.0}}]
            },
            "timestamp": "2026-03-01T05:07:00"
        })
    }

    fn client_for(server: &MockServer, timeout: Duration) -> WeatherClient {
        WeatherClient::new(&server.uri(), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_city_data_chains_coordinates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .and(query_param("city", "Seoul"))
            .respond_with(ResponseTemplate::new(200).set_body_json(weather_body("Seoul")))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/air-quality"))
            .and(query_param("lat", "37.57"))
            .and(query_param("lon", "126.98"))
            .respond_with(ResponseTemplate::new(200).set_body_json(air_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, DEFAULT_TIMEOUT);
        let record = client.fetch_city_data("Seoul").await.unwrap();

        assert_eq!(record.city_name(), "Seoul");
        assert_eq!(record.weather.main.humidity, 81);
        assert_eq!(record.current_aqi().unwrap().main.aqi, 3);
    }

    #[tokio::test]
    async fn test_city_name_is_url_encoded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .and(query_param("city", "New York"))
            .respond_with(ResponseTemplate::new(200).set_body_json(weather_body("New York")))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, DEFAULT_TIMEOUT);
        let weather = client.fetch_weather("New York").await.unwrap();
        assert_eq!(weather.name, "New York");
    }

    #[tokio::test]
    async fn test_server_error_uses_error_field() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": "Failed to fetch weather data for Atlantis"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, DEFAULT_TIMEOUT);
        let err = client.fetch_city_data("Atlantis").await.unwrap_err();

        assert_eq!(
            err,
            FetchError::Server {
                city: "Atlantis".into(),
                status: 500,
                message: "Failed to fetch weather data for Atlantis".into(),
            }
        );
        assert_eq!(
            err.to_string(),
            "Failed to fetch data for Atlantis: Failed to fetch weather data for Atlantis"
        );
    }

    #[tokio::test]
    async fn test_server_error_falls_back_to_status_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, DEFAULT_TIMEOUT);
        let err = client.fetch_weather("Seoul").await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to fetch data for Seoul: Bad Gateway");
    }

    #[tokio::test]
    async fn test_air_quality_failure_fails_city() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(weather_body("Seoul")))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/air-quality"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "Missing required parameters: lat and lon",
                "code": 400
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, DEFAULT_TIMEOUT);
        let err = client.fetch_city_data("Seoul").await.unwrap_err();
        assert!(matches!(err, FetchError::Server { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_timeout_names_city() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(weather_body("Seoul"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, Duration::from_millis(100));
        let err = client.fetch_city_data("Seoul").await.unwrap_err();

        assert_eq!(
            err,
            FetchError::Timeout {
                city: "Seoul".into()
            }
        );
        assert_eq!(err.to_string(), "Request timeout for Seoul");
    }

    #[tokio::test]
    async fn test_unreachable_server_names_endpoint() {
        // Port 1 is never listening in the test environment
        let client = WeatherClient::new("http://127.0.0.1:1/", DEFAULT_TIMEOUT).unwrap();
        let err = client.fetch_city_data("Seoul").await.unwrap_err();

        assert_eq!(
            err,
            FetchError::NetworkUnreachable {
                endpoint: "http://127.0.0.1:1".into()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_unknown_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, DEFAULT_TIMEOUT);
        let err = client.fetch_weather("Seoul").await.unwrap_err();

        assert!(matches!(err, FetchError::Unknown { ref city, .. } if city == "Seoul"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "healthy"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server, DEFAULT_TIMEOUT);
        assert!(client.health_check().await.unwrap());
    }
}
