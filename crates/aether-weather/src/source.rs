use aether_core::FetchError;
use async_trait::async_trait;

use crate::types::CityWeatherRecord;

/// Something that can produce a full weather record for a city.
///
/// `WeatherClient` is the production implementation; the dashboard only sees
/// this trait so refresh logic can be driven by scripted sources in tests.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch weather and air quality for `city`. No retries.
    async fn fetch_city_data(&self, city: &str) -> Result<CityWeatherRecord, FetchError>;
}
