//! The ordered list of cities the user is tracking.

use aether_core::ValidationError;

/// Ordered, duplicate-free list of city names with at least one entry.
///
/// Names are compared exactly (case-sensitive) after trimming on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCityList {
    cities: Vec<String>,
}

impl TrackedCityList {
    /// Build the session's starting list. Blank and repeated names are skipped;
    /// an empty result is rejected.
    pub fn new<I, T>(initial: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut list = Self { cities: Vec::new() };
        for name in initial {
            let name = name.as_ref().trim();
            if !name.is_empty() && !list.contains(name) {
                list.cities.push(name.to_string());
            }
        }

        if list.cities.is_empty() {
            return Err(ValidationError::EmptyCityName);
        }
        Ok(list)
    }

    /// Check a candidate name and return it trimmed.
    pub fn validate_new(&self, name: &str) -> Result<String, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyCityName);
        }
        if self.contains(name) {
            return Err(ValidationError::DuplicateCity(name.to_string()));
        }
        Ok(name.to_string())
    }

    pub fn add(&mut self, name: &str) -> Result<(), ValidationError> {
        let name = self.validate_new(name)?;
        self.cities.push(name);
        Ok(())
    }

    /// Remove a city. Refused when only one city is left, whatever the name.
    ///
    /// Returns false if the name was not tracked.
    pub fn remove(&mut self, name: &str) -> Result<bool, ValidationError> {
        if self.cities.len() <= 1 {
            return Err(ValidationError::LastCity);
        }

        let before = self.cities.len();
        self.cities.retain(|c| c != name);
        Ok(self.cities.len() != before)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cities.iter().any(|c| c == name)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.cities
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.cities.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    /// Always false; kept for the usual `len`/`is_empty` pairing.
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}
