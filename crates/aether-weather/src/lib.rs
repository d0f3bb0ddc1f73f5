//! Weather client for Aether
//!
//! Talks to the weather proxy (`/api/weather`, `/api/air-quality`) and
//! provides the snapshot types the dashboard renders.

pub mod client;
pub mod source;
pub mod types;

pub use client::WeatherClient;
pub use source::WeatherSource;
pub use types::*;
