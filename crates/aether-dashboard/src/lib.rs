//! Dashboard state for Aether
//!
//! Keeps the tracked city list, the latest weather and air-quality records,
//! the view selection and the theme in sync with the weather proxy.

pub mod city_list;
pub mod service;
pub mod synchronizer;
pub mod view;

#[cfg(test)]
mod test_support;

pub use city_list::TrackedCityList;
pub use service::{recv_event, Dashboard, DashboardEvent, RefreshSummary};
pub use synchronizer::{CityDataSynchronizer, RefreshOutcome, SyncSnapshot};
pub use view::{CityFilter, TabActivation, ViewSelection};
