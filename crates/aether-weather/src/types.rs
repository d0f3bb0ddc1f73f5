use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Pollutants shown in the detail view, in display order.
pub const DETAIL_POLLUTANTS: [&str; 4] = ["pm2_5", "pm10", "no2", "o3"];

/// Background category derived from a condition label ("Clear", "Rain", ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCategory {
    Clear,
    Clouds,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
    #[default]
    Default,
}

impl ConditionCategory {
    /// Classify a condition label by substring, case-insensitively.
    ///
    /// Earlier categories win: "thunderstorm with rain" is Rain.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| label.contains(n));

        if has(&["clear", "sun"]) {
            Self::Clear
        } else if has(&["cloud"]) {
            Self::Clouds
        } else if has(&["rain", "drizzle"]) {
            Self::Rain
        } else if has(&["thunder", "storm"]) {
            Self::Thunderstorm
        } else if has(&["snow", "sleet"]) {
            Self::Snow
        } else if has(&["mist", "fog", "haze"]) {
            Self::Mist
        } else {
            Self::Default
        }
    }

    /// Get icon name (the renderer maps it to a glyph)
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::Clouds => "cloud",
            Self::Rain => "cloud_rain",
            Self::Thunderstorm => "cloud_lightning",
            Self::Snow => "cloud_snow",
            Self::Mist => "cloud_fog",
            Self::Default => "globe",
        }
    }
}

/// Air Quality Index bucket with its display label and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AqiLevel {
    Excellent,
    Good,
    Moderate,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiLevel {
    const LEVELS: [AqiLevel; 6] = [
        AqiLevel::Excellent,
        AqiLevel::Good,
        AqiLevel::Moderate,
        AqiLevel::Unhealthy,
        AqiLevel::VeryUnhealthy,
        AqiLevel::Hazardous,
    ];

    /// Map a 1-based AQI index. Out-of-range values read as Excellent.
    pub fn from_index(aqi: u8) -> Self {
        usize::from(aqi)
            .checked_sub(1)
            .and_then(|i| Self::LEVELS.get(i).copied())
            .unwrap_or(AqiLevel::Excellent)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Excellent => "#10B981",
            Self::Good => "#34D399",
            Self::Moderate => "#FBBF24",
            Self::Unhealthy => "#F87171",
            Self::VeryUnhealthy => "#EF4444",
            Self::Hazardous => "#B91C1C",
        }
    }
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Temperatures (°C), humidity (%) and pressure (hPa)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub pressure: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

/// Condition code, label ("Rain"), description ("light rain") and icon id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDescriptor {
    pub id: i32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// Current weather for one city as returned by `/api/weather`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub name: String,
    pub coord: Coordinates,
    /// Offset from UTC in seconds
    pub timezone: i32,
    pub main: MainReadings,
    #[serde(default)]
    pub wind: Option<Wind>,
    #[serde(default)]
    pub weather: Vec<ConditionDescriptor>,
}

impl WeatherSnapshot {
    pub fn primary_condition(&self) -> Option<&ConditionDescriptor> {
        self.weather.first()
    }

    pub fn category(&self) -> ConditionCategory {
        self.primary_condition()
            .map(|c| ConditionCategory::from_label(&c.main))
            .unwrap_or_default()
    }

    pub fn wind_speed(&self) -> Option<f64> {
        self.wind.as_ref().map(|w| w.speed)
    }

    /// Wall-clock time in the city right now.
    pub fn local_time(&self) -> String {
        local_time(self.timezone, Utc::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AqiIndex {
    pub aqi: u8,
}

/// One AQI reading with its pollutant concentrations (μg/m³)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiReading {
    pub main: AqiIndex,
    #[serde(default)]
    pub components: BTreeMap<String, f64>,
}

impl AqiReading {
    pub fn level(&self) -> AqiLevel {
        AqiLevel::from_index(self.main.aqi)
    }

    pub fn pollutant(&self, name: &str) -> Option<f64> {
        self.components.get(name).copied()
    }
}

/// Air quality for one location as returned by `/api/air-quality`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySnapshot {
    #[serde(default)]
    pub list: Vec<AqiReading>,
}

impl AirQualitySnapshot {
    pub fn current(&self) -> Option<&AqiReading> {
        self.list.first()
    }
}

/// Weather plus air quality for one tracked city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityWeatherRecord {
    pub weather: WeatherSnapshot,
    #[serde(rename = "airQuality")]
    pub air_quality: Option<AirQualitySnapshot>,
}

impl CityWeatherRecord {
    pub fn city_name(&self) -> &str {
        &self.weather.name
    }

    pub fn current_aqi(&self) -> Option<&AqiReading> {
        self.air_quality.as_ref().and_then(|aq| aq.current())
    }
}

/// Format `now` in a city `offset_secs` east of UTC, e.g. "02:05 PM".
pub fn local_time(offset_secs: i32, now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(offset_secs) {
        Some(tz) => now.with_timezone(&tz).format("%I:%M %p").to_string(),
        None => {
            tracing::debug!("Invalid timezone offset {}, showing UTC", offset_secs);
            now.format("%I:%M %p").to_string()
        }
    }
}

/// Temperatures are displayed as whole degrees.
pub fn round_temperature(temp: f64) -> i64 {
    temp.round() as i64
}

/// Display label for a pollutant key ("pm2_5" -> "PM2.5").
pub fn pollutant_label(key: &str) -> String {
    key.replace('_', ".").to_uppercase()
}
