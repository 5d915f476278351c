//! Marketplace price lookup backed by a scraped Apify dataset

use crate::error::{AgentError, CollaboratorFailure, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::check_status;

const SERVICE: &str = "apify";

/// Listings kept after sorting by minimum price
pub const TOP_LISTINGS: usize = 5;

/// One scraped marketplace listing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    #[serde(rename = "product_url")]
    pub url: String,
    pub min_price: f64,
    pub max_price: f64,
    #[serde(rename = "product_image")]
    pub image_url: String,
}

impl Listing {
    fn validate(&self) -> std::result::Result<(), String> {
        reqwest::Url::parse(&self.url)
            .map_err(|e| format!("listing {:?}: invalid product_url: {}", self.title, e))?;
        reqwest::Url::parse(&self.image_url)
            .map_err(|e| format!("listing {:?}: invalid product_image: {}", self.title, e))?;
        if !self.min_price.is_finite() || !self.max_price.is_finite() {
            return Err(format!("listing {:?}: non-finite price", self.title));
        }
        Ok(())
    }
}

/// Aggregate price range across the top listings
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min_price: f64,
    pub max_price: f64,
}

impl PriceBounds {
    /// Overall min and max, or zeros when there are no listings
    pub fn from_listings(listings: &[Listing]) -> Self {
        if listings.is_empty() {
            return Self::default();
        }

        let min_price = listings
            .iter()
            .map(|l| l.min_price)
            .fold(f64::INFINITY, f64::min);
        let max_price = listings
            .iter()
            .map(|l| l.max_price)
            .fold(f64::NEG_INFINITY, f64::max);

        Self {
            min_price,
            max_price,
        }
    }
}

/// Source of marketplace listings for a product
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Up to five listings, cheapest first
    async fn listings(&self, product: &str) -> Result<Vec<Listing>>;

    async fn price_bounds(&self, product: &str) -> Result<PriceBounds> {
        let listings = self.listings(product).await?;
        Ok(PriceBounds::from_listings(&listings))
    }
}

/// Parse and validate a dataset body, keeping the cheapest listings
pub fn parse_listings(body: &[u8]) -> Result<Vec<Listing>> {
    let mut listings: Vec<Listing> = serde_json::from_slice(body).map_err(|e| {
        AgentError::collaborator(SERVICE, CollaboratorFailure::Schema(e.to_string()))
    })?;

    for listing in &listings {
        listing
            .validate()
            .map_err(|e| AgentError::collaborator(SERVICE, CollaboratorFailure::Schema(e)))?;
    }

    listings.sort_by(|a, b| a.min_price.total_cmp(&b.min_price));
    listings.truncate(TOP_LISTINGS);
    Ok(listings)
}

/// Apify dataset configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApifyConfig {
    pub base_url: String,
    pub dataset_id: String,
}

impl Default for ApifyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.apify.com".to_string(),
            dataset_id: "vYjbsvVHpbG7ce526".to_string(),
        }
    }
}

/// Reads listings from a pre-scraped Apify dataset
pub struct ApifyPriceSource {
    config: ApifyConfig,
    token: String,
    client: reqwest::Client,
}

impl ApifyPriceSource {
    pub fn new(config: ApifyConfig, token: String) -> Self {
        Self {
            config,
            token,
            client: reqwest::Client::new(),
        }
    }

    fn items_url(&self) -> String {
        format!(
            "{}/v2/datasets/{}/items",
            self.config.base_url.trim_end_matches('/'),
            self.config.dataset_id
        )
    }
}

#[async_trait]
impl PriceSource for ApifyPriceSource {
    async fn listings(&self, product: &str) -> Result<Vec<Listing>> {
        // The dataset is scraped ahead of time; the product only labels the lookup
        tracing::info!("Fetching listings for {:?} from dataset {}", product, self.config.dataset_id);

        let response = self
            .client
            .get(self.items_url())
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| AgentError::transport(SERVICE, e))?;
        let body = check_status(SERVICE, response)?
            .bytes()
            .await
            .map_err(|e| AgentError::transport(SERVICE, e))?;

        let listings = parse_listings(&body)?;
        tracing::debug!("Top listings: {:?}", listings);
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, min_price: f64, max_price: f64) -> Listing {
        Listing {
            title: title.to_string(),
            url: format!("https://example.com/{}", title),
            min_price,
            max_price,
            image_url: format!("https://img.example.com/{}.jpg", title),
        }
    }

    #[test]
    fn test_bounds_from_listings() {
        let listings = vec![
            listing("a", 0.02, 0.05),
            listing("b", 0.03, 0.04),
            listing("c", 0.015, 0.03),
        ];

        let bounds = PriceBounds::from_listings(&listings);
        assert_eq!(bounds.min_price, 0.015);
        assert_eq!(bounds.max_price, 0.05);
    }

    #[test]
    fn test_empty_listings_give_zero_bounds() {
        assert_eq!(
            PriceBounds::from_listings(&[]),
            PriceBounds {
                min_price: 0.0,
                max_price: 0.0
            }
        );
    }

    #[test]
    fn test_parse_keeps_cheapest_five() {
        let items: Vec<serde_json::Value> = [0.09, 0.01, 0.07, 0.03, 0.05, 0.02, 0.08]
            .iter()
            .enumerate()
            .map(|(i, price)| {
                serde_json::json!({
                    "title": format!("gloves {}", i),
                    "product_url": format!("https://shop.example.com/p/{}", i),
                    "min_price": price,
                    "max_price": price * 2.0,
                    "product_image": format!("https://shop.example.com/i/{}.png", i),
                })
            })
            .collect();
        let body = serde_json::to_vec(&items).unwrap();

        let listings = parse_listings(&body).unwrap();
        let prices: Vec<f64> = listings.iter().map(|l| l.min_price).collect();

        assert_eq!(prices, vec![0.01, 0.02, 0.03, 0.05, 0.07]);
    }

    #[test]
    fn test_parse_rejects_bad_url() {
        let body = serde_json::to_vec(&serde_json::json!([{
            "title": "gloves",
            "product_url": "not a url",
            "min_price": 0.02,
            "max_price": 0.03,
            "product_image": "https://img.example.com/g.png",
        }]))
        .unwrap();

        let err = parse_listings(&body).unwrap_err();
        assert!(matches!(
            err,
            AgentError::Collaborator {
                failure: CollaboratorFailure::Schema(_),
                ..
            }
        ));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let body = br#"[{"title": "gloves", "min_price": 0.02}]"#;
        assert!(parse_listings(body).is_err());
    }

    #[test]
    fn test_parse_empty_dataset() {
        assert!(parse_listings(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_items_url() {
        let source = ApifyPriceSource::new(
            ApifyConfig {
                base_url: "https://api.apify.com/".to_string(),
                dataset_id: "abc".to_string(),
            },
            "token".to_string(),
        );
        assert_eq!(source.items_url(), "https://api.apify.com/v2/datasets/abc/items");
    }

    struct FixedSource(Vec<Listing>);

    #[async_trait]
    impl PriceSource for FixedSource {
        async fn listings(&self, _product: &str) -> Result<Vec<Listing>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_default_price_bounds() {
        let source = FixedSource(vec![listing("a", 1.0, 3.0), listing("b", 2.0, 4.0)]);
        let bounds = source.price_bounds("gloves").await.unwrap();
        assert_eq!(bounds.min_price, 1.0);
        assert_eq!(bounds.max_price, 4.0);

        let empty = FixedSource(vec![]);
        assert_eq!(empty.price_bounds("gloves").await.unwrap(), PriceBounds::default());
    }
}
