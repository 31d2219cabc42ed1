//! Calendar sources and the registry that holds them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EngineError, EngineResult};

/// One subscribed feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSource {
    pub name: String,
    pub url: String,
}

impl CalendarSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        CalendarSource {
            name: name.into(),
            url: url.into(),
        }
    }

    /// URL to request. `webcal://` subscriptions are served over HTTPS.
    pub fn fetch_url(&self) -> Option<Url> {
        let url = match self.url.strip_prefix("webcal://") {
            Some(rest) => format!("https://{}", rest),
            None => self.url.clone(),
        };
        Url::parse(&url).ok()
    }
}

/// The configured sources, in display order. Immutable after startup.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<CalendarSource>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<CalendarSource>) -> EngineResult<Self> {
        let mut seen = HashSet::new();

        for source in &sources {
            if source.name.trim().is_empty() {
                return Err(EngineError::Config("Calendar name cannot be empty".into()));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(EngineError::Config(format!(
                    "Duplicate calendar name '{}'",
                    source.name
                )));
            }
            if source.fetch_url().is_none() {
                return Err(EngineError::Config(format!(
                    "Invalid URL for calendar '{}': {}",
                    source.name, source.url
                )));
            }
        }

        Ok(SourceRegistry { sources })
    }

    pub fn sources(&self) -> &[CalendarSource] {
        &self.sources
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webcal_is_fetched_over_https() {
        let source = CalendarSource::new("Holidays", "webcal://example.com/holidays.ics");
        assert_eq!(
            source.fetch_url().unwrap().as_str(),
            "https://example.com/holidays.ics"
        );
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let result = SourceRegistry::new(vec![
            CalendarSource::new("Home", "https://example.com/a.ics"),
            CalendarSource::new("Home", "https://example.com/b.ics"),
        ]);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_registry_rejects_bad_url() {
        let result = SourceRegistry::new(vec![CalendarSource::new("Home", "not a url")]);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_registry_keeps_order() {
        let registry = SourceRegistry::new(vec![
            CalendarSource::new("Home", "https://example.com/a.ics"),
            CalendarSource::new("Work", "https://example.com/b.ics"),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["Home", "Work"]);
    }
}
