//! RapidAPI "hotels4" provider implementation

use super::{HotelResult, ProviderError, SearchCriteria, SortOrder};
use crate::runtime::HotelProvider;
use crate::state_machine::CityMatch;
use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

const MILES_TO_KM: f64 = 1.609_344;
const CENTER_LANDMARK: &str = "City center";
const CURRENCY: &str = "USD";
/// Page size for distance-bounded searches, which are filtered after the fact
const DISTANCE_PAGE_SIZE: u8 = 25;
const PHOTO_SIZE_SUFFIX: &str = "z";

/// Connection settings for the hotels4 API
#[derive(Debug, Clone)]
pub struct RapidApiConfig {
    pub api_key: String,
    pub host: String,
    pub locale: String,
    pub timeout: Duration,
}

/// hotels4 service implementation
pub struct RapidApiProvider {
    client: Client,
    config: RapidApiConfig,
    base_url: String,
}

impl RapidApiProvider {
    pub fn new(config: RapidApiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let base_url = format!("https://{}", config.host);
        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .header("X-RapidAPI-Key", &self.config.api_key)
            .header("X-RapidAPI-Host", &self.config.host)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        Ok(response.json::<T>().await?)
    }

    /// Photo URLs for one hotel; failures degrade to no photos
    async fn hotel_photos(&self, hotel_id: &str, count: u8) -> Vec<String> {
        let query = [("id", hotel_id.to_string())];
        match self
            .get::<PhotosResponse>("properties/get-hotel-photos", &query)
            .await
        {
            Ok(response) => response.urls(usize::from(count)),
            Err(e) => {
                tracing::warn!(hotel_id = %hotel_id, error = %e, "Failed to fetch hotel photos");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl HotelProvider for RapidApiProvider {
    async fn lookup_city(&self, query: &str) -> Result<Vec<CityMatch>, ProviderError> {
        let params = [
            ("query", query.to_string()),
            ("locale", self.config.locale.clone()),
            ("currency", CURRENCY.to_string()),
        ];
        let response: LocationsResponse = self.get("locations/v2/search", &params).await?;
        Ok(response.cities())
    }

    async fn search_hotels(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<HotelResult>, ProviderError> {
        let page_size = if criteria.max_distance_km.is_some() {
            DISTANCE_PAGE_SIZE.max(criteria.result_count)
        } else {
            criteria.result_count
        };

        let mut params = vec![
            ("destinationId", criteria.destination_id.clone()),
            ("pageNumber", "1".to_string()),
            ("pageSize", page_size.to_string()),
            ("checkIn", criteria.check_in.format("%Y-%m-%d").to_string()),
            ("checkOut", criteria.check_out.format("%Y-%m-%d").to_string()),
            ("adults1", "1".to_string()),
            ("sortOrder", sort_param(criteria.sort).to_string()),
            ("locale", self.config.locale.clone()),
            ("currency", CURRENCY.to_string()),
            ("landmarkIds", CENTER_LANDMARK.to_string()),
        ];
        if let Some(range) = criteria.price_range {
            params.push(("priceMin", range.min.to_string()));
            params.push(("priceMax", range.max.to_string()));
        }

        let response: PropertiesResponse = self.get("properties/list", &params).await?;
        let mut hotels = collect_hotels(response, criteria);

        let photos = join_all(
            hotels
                .iter()
                .map(|hotel| self.hotel_photos(&hotel.id, criteria.photo_count)),
        )
        .await;
        for (hotel, urls) in hotels.iter_mut().zip(photos) {
            hotel.photos = urls;
        }

        Ok(hotels)
    }
}

fn sort_param(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::PriceAscending => "PRICE",
        SortOrder::PriceDescending => "PRICE_HIGHEST_FIRST",
        SortOrder::DistanceFromCenter => "DISTANCE_FROM_LANDMARK",
    }
}

fn collect_hotels(response: PropertiesResponse, criteria: &SearchCriteria) -> Vec<HotelResult> {
    let nights = criteria.nights();
    response
        .into_properties()
        .into_iter()
        .filter_map(|property| property.into_hotel(nights))
        .filter(|hotel| match (criteria.max_distance_km, hotel.distance_km) {
            (Some(max), Some(distance)) => distance <= max,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .take(usize::from(criteria.result_count))
        .collect()
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    #[serde(default)]
    group: String,
    #[serde(default)]
    entities: Vec<LocationEntity>,
}

#[derive(Debug, Deserialize)]
struct LocationEntity {
    #[serde(rename = "destinationId")]
    destination_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    caption: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
}

impl LocationsResponse {
    fn cities(self) -> Vec<CityMatch> {
        let mut cities: Vec<CityMatch> = Vec::new();
        for entity in self
            .suggestions
            .into_iter()
            .filter(|s| s.group == "CITY_GROUP")
            .flat_map(|s| s.entities)
            .filter(|e| e.kind == "CITY")
        {
            if cities.iter().any(|c| c.id == entity.destination_id) {
                continue;
            }
            let name = entity
                .caption
                .as_deref()
                .map(strip_markup)
                .filter(|caption| !caption.is_empty())
                .unwrap_or(entity.name);
            cities.push(CityMatch::new(entity.destination_id, name));
        }
        cities
    }
}

#[derive(Debug, Deserialize)]
struct PropertiesResponse {
    #[serde(default)]
    data: Option<PropertiesData>,
}

#[derive(Debug, Deserialize)]
struct PropertiesData {
    body: PropertiesBody,
}

#[derive(Debug, Deserialize)]
struct PropertiesBody {
    #[serde(rename = "searchResults")]
    search_results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<Property>,
}

impl PropertiesResponse {
    fn into_properties(self) -> Vec<Property> {
        self.data
            .map(|d| d.body.search_results.results)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Property {
    id: i64,
    name: String,
    #[serde(rename = "guestReviews", default)]
    guest_reviews: Option<GuestReviews>,
    #[serde(rename = "ratePlan", default)]
    rate_plan: Option<RatePlan>,
    #[serde(default)]
    landmarks: Vec<Landmark>,
}

#[derive(Debug, Deserialize)]
struct GuestReviews {
    #[serde(rename = "unformattedRating", default)]
    rating: f64,
    #[serde(default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct RatePlan {
    price: Price,
}

#[derive(Debug, Deserialize)]
struct Price {
    #[serde(rename = "exactCurrent")]
    exact_current: f64,
}

#[derive(Debug, Deserialize)]
struct Landmark {
    label: String,
    distance: String,
}

impl Property {
    /// Hotels without a quoted price are dropped
    fn into_hotel(self, nights: i64) -> Option<HotelResult> {
        let price = self.rate_plan?.price.exact_current;
        let distance_km = self
            .landmarks
            .iter()
            .find(|l| l.label == CENTER_LANDMARK)
            .and_then(|l| parse_distance_km(&l.distance));
        let (rating, review_count) = self
            .guest_reviews
            .map_or((0.0, 0), |r| (r.rating, r.total));

        #[allow(clippy::cast_precision_loss)]
        let total_price = price * nights as f64;

        Some(HotelResult {
            id: self.id.to_string(),
            link: Some(format!(
                "https://www.hotels.com/h{}.Hotel-Information",
                self.id
            )),
            name: self.name,
            price_per_night: price,
            total_price,
            distance_km,
            rating,
            review_count,
            photos: Vec::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PhotosResponse {
    #[serde(rename = "hotelImages", default)]
    hotel_images: Vec<HotelImage>,
}

#[derive(Debug, Deserialize)]
struct HotelImage {
    #[serde(rename = "baseUrl")]
    base_url: String,
}

impl PhotosResponse {
    fn urls(self, count: usize) -> Vec<String> {
        self.hotel_images
            .into_iter()
            .take(count)
            .map(|image| image.base_url.replace("{size}", PHOTO_SIZE_SUFFIX))
            .collect()
    }
}

// ============================================================================
// Scraping Helpers
// ============================================================================

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"))
}

fn distance_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*([0-9]+(?:[.,][0-9]+)?)\s*(miles?|mi|km|kilometers?)?\s*$")
            .expect("distance pattern is valid")
    })
}

/// Remove highlight tags the provider embeds in captions
fn strip_markup(caption: &str) -> String {
    markup_regex().replace_all(caption, "").trim().to_string()
}

/// Parse "1.2 miles" / "0,8 km" into kilometres; a bare number is taken as miles
fn parse_distance_km(text: &str) -> Option<f64> {
    let captures = distance_regex().captures(text)?;
    let value: f64 = captures.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let is_km = captures
        .get(2)
        .is_some_and(|unit| unit.as_str().to_ascii_lowercase().starts_with('k'));
    Some(if is_km { value } else { value * MILES_TO_KM })
}
