//! Hotel search provider abstraction
//!
//! Types exchanged with the external hotel-search service, its error
//! classification, and a logging decorator around any provider.

mod rapid_api;

pub use rapid_api::{RapidApiConfig, RapidApiProvider};

use crate::runtime::HotelProvider;
use crate::state_machine::CityMatch;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Query and Result Types
// ============================================================================

/// One hotel as returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelResult {
    pub id: String,
    pub name: String,
    /// USD per night
    pub price_per_night: f64,
    /// USD for the whole stay
    pub total_price: f64,
    pub distance_km: Option<f64>,
    /// Guest rating out of 10
    pub rating: f64,
    pub review_count: u32,
    #[serde(default)]
    pub photos: Vec<String>,
    /// Provider page with the full hotel description
    #[serde(default)]
    pub link: Option<String>,
}

/// Result ordering requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    PriceAscending,
    PriceDescending,
    DistanceFromCenter,
}

/// Nightly price bounds, forwarded exactly as the user entered them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u32,
    pub max: u32,
}

/// Fully assembled hotel query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchCriteria {
    pub destination_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub result_count: u8,
    pub photo_count: u8,
    pub sort: SortOrder,
    pub price_range: Option<PriceRange>,
    pub max_distance_km: Option<f64>,
}

impl SearchCriteria {
    /// Length of stay; at least one night
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days().max(1)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Provider error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidResponse, message)
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Auth,
            429 => ProviderErrorKind::RateLimit,
            500..=599 => ProviderErrorKind::ServerError,
            _ => ProviderErrorKind::InvalidResponse,
        };
        Self::new(kind, format!("HTTP {status}: {body}"))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(e.to_string())
        } else if e.is_decode() {
            Self::invalid_response(e.to_string())
        } else {
            Self::network(e.to_string())
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection failures
    Network,
    /// No reply within the configured bound
    Timeout,
    /// Too many requests (429)
    RateLimit,
    /// Missing or rejected API key (401, 403)
    Auth,
    /// Provider-side failure (5xx)
    ServerError,
    /// Reply could not be understood
    InvalidResponse,
}

// ============================================================================
// Logging Decorator
// ============================================================================

/// Logging wrapper for hotel providers
pub struct LoggingProvider {
    inner: Arc<dyn HotelProvider>,
}

impl LoggingProvider {
    pub fn new(inner: Arc<dyn HotelProvider>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl HotelProvider for LoggingProvider {
    async fn lookup_city(&self, query: &str) -> Result<Vec<CityMatch>, ProviderError> {
        let start = std::time::Instant::now();
        let result = self.inner.lookup_city(query).await;
        let duration = start.elapsed();

        match &result {
            Ok(matches) => {
                tracing::info!(
                    query = %query,
                    duration_ms = %duration.as_millis(),
                    matches = matches.len(),
                    "City lookup completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    query = %query,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "City lookup failed"
                );
            }
        }

        result
    }

    async fn search_hotels(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<HotelResult>, ProviderError> {
        let start = std::time::Instant::now();
        let result = self.inner.search_hotels(criteria).await;
        let duration = start.elapsed();

        match &result {
            Ok(hotels) => {
                tracing::info!(
                    destination_id = %criteria.destination_id,
                    sort = ?criteria.sort,
                    duration_ms = %duration.as_millis(),
                    hotels = hotels.len(),
                    "Hotel search completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    destination_id = %criteria.destination_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Hotel search failed"
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nights_counts_days_between_dates() {
        let criteria = SearchCriteria {
            destination_id: "1".to_string(),
            check_in: NaiveDate::from_ymd_opt(2026, 12, 30).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2027, 1, 2).unwrap(),
            result_count: 3,
            photo_count: 1,
            sort: SortOrder::PriceAscending,
            price_range: None,
            max_distance_km: None,
        };
        assert_eq!(criteria.nights(), 3);
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(ProviderError::from_status(403, "").kind, ProviderErrorKind::Auth);
        assert_eq!(ProviderError::from_status(429, "").kind, ProviderErrorKind::RateLimit);
        assert_eq!(ProviderError::from_status(502, "").kind, ProviderErrorKind::ServerError);
        assert_eq!(
            ProviderError::from_status(404, "").kind,
            ProviderErrorKind::InvalidResponse
        );
    }

    #[test]
    fn test_hotel_result_serializes_for_audit() {
        let hotel = HotelResult {
            id: "42".to_string(),
            name: "Grand".to_string(),
            price_per_night: 120.0,
            total_price: 240.0,
            distance_km: None,
            rating: 8.6,
            review_count: 310,
            photos: vec![],
            link: None,
        };
        let json = serde_json::to_value(&hotel).unwrap();
        assert_eq!(json["name"], "Grand");
        assert!(json["distance_km"].is_null());

        let back: HotelResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, hotel);
    }
}
