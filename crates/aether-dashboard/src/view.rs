//! View selection: which cities the grid shows and which city, if any, has
//! its detail view open. Pure state, no I/O.

use aether_weather::CityWeatherRecord;

/// Grid filter: every city, or one by name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CityFilter {
    #[default]
    All,
    City(String),
}

impl CityFilter {
    pub fn matches(&self, city: &str) -> bool {
        match self {
            CityFilter::All => true,
            CityFilter::City(name) => name == city,
        }
    }

    pub fn is_city(&self, city: &str) -> bool {
        matches!(self, CityFilter::City(name) if name == city)
    }
}

/// What a city tab activation ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabActivation {
    OpenedDetail,
    SelectedFilter,
    /// Detail requested for a city with no record yet.
    NoRecord,
}

/// Open detail view: the tracked name it was opened for and a copy of the
/// record at that time. The proxy may report a different name than the one
/// tracked, so the two are kept separately.
#[derive(Debug, Clone, PartialEq)]
struct DetailView {
    city: String,
    record: CityWeatherRecord,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSelection {
    selected_filter: CityFilter,
    /// Not refreshed while open.
    detail: Option<DetailView>,
}

impl ViewSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_filter(&self) -> &CityFilter {
        &self.selected_filter
    }

    pub fn detail(&self) -> Option<&CityWeatherRecord> {
        self.detail.as_ref().map(|d| &d.record)
    }

    /// Tracked name the open detail view belongs to.
    pub fn detail_city(&self) -> Option<&str> {
        self.detail.as_ref().map(|d| d.city.as_str())
    }

    pub fn is_detail_open(&self) -> bool {
        self.detail.is_some()
    }

    pub fn select_filter(&mut self, filter: CityFilter) {
        self.selected_filter = filter;
    }

    /// Open the detail view on `record`, tracked under its reported name.
    pub fn open_detail(&mut self, record: CityWeatherRecord) {
        let city = record.city_name().to_string();
        self.detail = Some(DetailView { city, record });
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    /// Open the detail view for `city` if `lookup` has a record for it.
    /// Returns false, leaving state unchanged, when there is none.
    pub fn open_detail_for<F>(&mut self, city: &str, lookup: F) -> bool
    where
        F: FnOnce(&str) -> Option<CityWeatherRecord>,
    {
        match lookup(city) {
            Some(record) => {
                self.detail = Some(DetailView {
                    city: city.to_string(),
                    record,
                });
                true
            }
            None => {
                tracing::debug!("No record for {}, detail view not opened", city);
                false
            }
        }
    }

    /// Single control for a city tab.
    ///
    /// With another city's detail open, switches the detail to `city`.
    /// On the tab that is already the active filter, opens its detail.
    /// Otherwise selects `city` as the filter.
    pub fn activate_city_tab<F>(&mut self, city: &str, lookup: F) -> TabActivation
    where
        F: FnOnce(&str) -> Option<CityWeatherRecord>,
    {
        let other_detail_open = self.detail_city().is_some_and(|open| open != city);

        if other_detail_open || self.selected_filter.is_city(city) {
            if self.open_detail_for(city, lookup) {
                TabActivation::OpenedDetail
            } else {
                TabActivation::NoRecord
            }
        } else {
            self.select_filter(CityFilter::City(city.to_string()));
            TabActivation::SelectedFilter
        }
    }

    /// Keep the selection consistent after `city` left the tracked list.
    pub fn on_city_removed(&mut self, city: &str) {
        if self.selected_filter.is_city(city) {
            self.selected_filter = CityFilter::All;
        }
        if self.detail_city() == Some(city) {
            self.detail = None;
        }
    }
}
