//! USDA FoodData Central composition lookup.
//!
//! Searches for the term, fetches the best match and flattens its
//! ingredient list, additive-like components and concerning nutrients.

#![cfg_attr(not(feature = "food-databases"), allow(dead_code))]

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use carcinoscan_core::EvidenceSource;

use super::EvidenceProvider;
use crate::config::UsdaConfig;
use crate::providers::{ApiCredential, CredentialSource, ProviderError};

/// Environment variable for the FoodData Central key.
pub const USDA_API_KEY_ENV: &str = "USDA_API_KEY";

/// Public rate-limited key accepted by FoodData Central.
pub const USDA_DEMO_KEY: &str = "DEMO_KEY";

const ADDITIVE_MARKERS: [&str; 5] = ["preservative", "color", "artificial", "sodium", "phosphate"];
const CONCERNING_NUTRIENTS: [&str; 5] =
    ["sodium", "sugar", "saturated fat", "trans fat", "cholesterol"];
const NUTRIENTS_SCANNED: usize = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    foods: Vec<FoodSummary>,
}

#[derive(Debug, Deserialize)]
struct FoodSummary {
    #[serde(rename = "fdcId")]
    fdc_id: u64,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FoodDetails {
    description: String,
    fdc_id: Option<u64>,
    ingredients: Option<String>,
    food_components: Vec<FoodComponent>,
    food_nutrients: Vec<FoodNutrient>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FoodComponent {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FoodNutrient {
    nutrient: Option<Nutrient>,
    amount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Nutrient {
    name: String,
    unit_name: Option<String>,
}

/// FoodData Central provider.
#[derive(Debug, Clone)]
pub struct UsdaProvider {
    base_url: String,
    api_key: ApiCredential,
    timeout: Duration,
    max_ingredients: usize,
}

impl UsdaProvider {
    /// Build from config. The key falls back to `USDA_API_KEY`, then to the
    /// public demo key.
    pub fn from_config(config: &UsdaConfig) -> Self {
        let configured = config.api_key.as_ref().map(ApiCredential::expose);
        let api_key = ApiCredential::resolve_optional(configured, USDA_API_KEY_ENV, "USDA API key")
            .unwrap_or_else(|| {
                ApiCredential::new(USDA_DEMO_KEY, CredentialSource::Programmatic, "USDA API key")
            });

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: config.timeout,
            max_ingredients: config.max_ingredients,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[cfg(feature = "food-databases")]
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        use crate::providers::http;

        let response = http::client()?
            .get(url)
            .query(query)
            .query(&[("api_key", self.api_key.expose())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout))?;

        http::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl EvidenceProvider for UsdaProvider {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::PrimaryDatabase
    }

    fn label(&self) -> &str {
        "USDA FoodData Central"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_configured(&self) -> bool {
        cfg!(feature = "food-databases")
    }

    #[cfg(feature = "food-databases")]
    async fn lookup(&self, term: &str) -> Result<String, ProviderError> {
        let search: SearchResponse = self
            .get_json(
                format!("{}/foods/search", self.base_url),
                &[("query", term), ("pageSize", "5")],
            )
            .await?;

        let best = search
            .foods
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NoMatch(term.to_string()))?;
        tracing::debug!(term, fdc_id = best.fdc_id, description = %best.description, "USDA match");

        let mut details: FoodDetails = self
            .get_json(format!("{}/food/{}", self.base_url, best.fdc_id), &[])
            .await?;
        if details.description.is_empty() {
            details.description = best.description;
        }
        details.fdc_id.get_or_insert(best.fdc_id);

        Ok(render(&details, self.max_ingredients))
    }

    #[cfg(not(feature = "food-databases"))]
    async fn lookup(&self, _term: &str) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(
            "USDA lookups require the 'food-databases' feature".to_string(),
        ))
    }
}

fn bullets(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        format!("- {}", empty)
    } else {
        items
            .iter()
            .map(|item| format!("- {}", item))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn render(details: &FoodDetails, max_ingredients: usize) -> String {
    let ingredients: Vec<String> = details
        .ingredients
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max_ingredients)
        .map(str::to_string)
        .collect();

    let additives: Vec<String> = details
        .food_components
        .iter()
        .filter(|c| {
            let lower = c.name.to_lowercase();
            ADDITIVE_MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(|c| c.name.clone())
        .collect();

    let nutrients: Vec<String> = details
        .food_nutrients
        .iter()
        .take(NUTRIENTS_SCANNED)
        .filter_map(|n| {
            let nutrient = n.nutrient.as_ref()?;
            let name = nutrient.name.to_lowercase();
            CONCERNING_NUTRIENTS
                .iter()
                .any(|c| name.contains(c))
                .then(|| {
                    format!(
                        "{}: {} {}",
                        name,
                        n.amount.unwrap_or(0.0),
                        nutrient.unit_name.as_deref().unwrap_or_default()
                    )
                    .trim_end()
                    .to_string()
                })
        })
        .collect();

    let id = details
        .fdc_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Food: {}\nDatabase ID: {}\n\nIngredients:\n{}\n\nAdditives and preservatives:\n{}\n\nNutrients of concern:\n{}",
        details.description,
        id,
        bullets(&ingredients, "No detailed ingredients available"),
        bullets(&additives, "No specific additives identified"),
        bullets(&nutrients, "No concerning nutrient levels identified"),
    )
}
