//! Scripted weather source for unit tests.

use std::collections::HashMap;
use std::time::Duration;

use aether_core::FetchError;
use aether_weather::{
    AirQualitySnapshot, AqiIndex, AqiReading, CityWeatherRecord, ConditionDescriptor, Coordinates,
    MainReadings, WeatherSnapshot, WeatherSource, Wind,
};
use async_trait::async_trait;
use parking_lot::Mutex;

pub(crate) fn record(city: &str, temp: f64) -> CityWeatherRecord {
    CityWeatherRecord {
        weather: WeatherSnapshot {
            name: city.to_string(),
            coord: Coordinates {
                lat: 37.57,
                lon: 126.98,
            },
            timezone: 32400,
            main: MainReadings {
                temp,
                feels_like: temp - 1.0,
                temp_min: temp - 2.0,
                temp_max: temp + 2.0,
                humidity: 55,
                pressure: 1013,
            },
            wind: Some(Wind { speed: 3.2 }),
            weather: vec![ConditionDescriptor {
                id: 800,
                main: "Clear".to_string(),
                description: "clear sky".to_string(),
                icon: "01d".to_string(),
            }],
        },
        air_quality: Some(AirQualitySnapshot {
            list: vec![AqiReading {
                main: AqiIndex { aqi: 2 },
                components: [("pm2_5".to_string(), 8.0), ("pm10".to_string(), 15.0)]
                    .into_iter()
                    .collect(),
            }],
        }),
    }
}

/// Answers every city with `record(city, temperature)` unless told otherwise.
pub(crate) struct ScriptedSource {
    temperature: Mutex<f64>,
    failures: Mutex<HashMap<String, FetchError>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self {
            temperature: Mutex::new(20.0),
            failures: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn set_temperature(&self, temp: f64) {
        *self.temperature.lock() = temp;
    }

    pub(crate) fn fail(&self, city: &str, error: FetchError) {
        self.failures.lock().insert(city.to_string(), error);
    }

    pub(crate) fn delay(&self, city: &str, delay: Duration) {
        self.delays.lock().insert(city.to_string(), delay);
    }

    pub(crate) fn calls(&self, city: &str) -> usize {
        self.calls.lock().get(city).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl WeatherSource for ScriptedSource {
    async fn fetch_city_data(&self, city: &str) -> Result<CityWeatherRecord, FetchError> {
        *self.calls.lock().entry(city.to_string()).or_insert(0) += 1;

        let delay = self.delays.lock().get(city).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().get(city).cloned();
        match failure {
            Some(error) => Err(error),
            None => Ok(record(city, *self.temperature.lock())),
        }
    }
}
