//! OpenFoodFacts product lookup.
//!
//! The only source that carries a processing classification. It is rendered
//! as the literal `Category: N` so the assessment prompt can extract it.

#![cfg_attr(not(feature = "food-databases"), allow(dead_code))]

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use carcinoscan_core::EvidenceSource;

use super::EvidenceProvider;
use crate::config::OpenFoodFactsConfig;
use crate::providers::ProviderError;

const SEARCH_FIELDS: &str = "product_name,brands,code,ingredients_text,additives_tags,\
allergens_tags,nutrition_grades,nova_group,ecoscore_grade";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    products: Vec<Product>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Product {
    product_name: Option<String>,
    brands: Option<String>,
    code: Option<String>,
    ingredients_text: Option<String>,
    additives_tags: Vec<String>,
    allergens_tags: Vec<String>,
    nutrition_grades: Option<String>,
    /// Number or numeric string depending on the record
    nova_group: Option<JsonValue>,
    ecoscore_grade: Option<String>,
}

impl Product {
    fn processing_category(&self) -> Option<u8> {
        let raw = match self.nova_group.as_ref()? {
            JsonValue::Number(n) => n.as_u64()?,
            JsonValue::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        (1..=4).contains(&raw).then_some(raw as u8)
    }
}

/// OpenFoodFacts provider.
#[derive(Debug, Clone)]
pub struct OpenFoodFactsProvider {
    base_url: String,
    timeout: Duration,
    max_products: usize,
}

impl OpenFoodFactsProvider {
    pub fn from_config(config: &OpenFoodFactsConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            max_products: config.max_products,
        }
    }
}

#[async_trait]
impl EvidenceProvider for OpenFoodFactsProvider {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::SecondaryDatabase
    }

    fn label(&self) -> &str {
        "OpenFoodFacts"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_configured(&self) -> bool {
        cfg!(feature = "food-databases")
    }

    #[cfg(feature = "food-databases")]
    async fn lookup(&self, term: &str) -> Result<String, ProviderError> {
        use crate::providers::http;

        let page_size = self.max_products.max(1).to_string();
        let response = http::client()?
            .get(format!("{}/cgi/search.pl", self.base_url))
            .query(&[
                ("search_terms", term),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", page_size.as_str()),
                ("fields", SEARCH_FIELDS),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout))?;

        let body: SearchResponse = http::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        render(term, &body.products, self.max_products)
    }

    #[cfg(not(feature = "food-databases"))]
    async fn lookup(&self, _term: &str) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(
            "OpenFoodFacts lookups require the 'food-databases' feature".to_string(),
        ))
    }
}

/// "en:e250-sodium-nitrite" -> "e250 sodium nitrite"
fn clean_tag(tag: &str) -> String {
    let stripped = tag.split_once(':').map_or(tag, |(_, rest)| rest);
    stripped.replace('-', " ")
}

fn tag_list(tags: &[String], empty: &str) -> String {
    if tags.is_empty() {
        empty.to_string()
    } else {
        tags.iter().map(|t| clean_tag(t)).collect::<Vec<_>>().join(", ")
    }
}

fn render_product(index: usize, product: &Product, term: &str) -> String {
    let category = product
        .processing_category()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    format!(
        "Product {}: {}\nBrand(s): {}\nBarcode: {}\nIngredients: {}\nAdditives: {}\nAllergens: {}\nNutrition grade: {}\nProcessing Category: {} (NOVA, 1=unprocessed, 4=ultra-processed)\nEco grade: {}",
        index + 1,
        product.product_name.as_deref().filter(|s| !s.is_empty()).unwrap_or(term),
        product.brands.as_deref().filter(|s| !s.is_empty()).unwrap_or("No brand"),
        product.code.as_deref().unwrap_or("unknown"),
        product
            .ingredients_text
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("No ingredients data available"),
        tag_list(&product.additives_tags, "None identified"),
        tag_list(&product.allergens_tags, "None identified"),
        product.nutrition_grades.as_deref().unwrap_or("unknown").to_uppercase(),
        category,
        product.ecoscore_grade.as_deref().unwrap_or("unknown").to_uppercase(),
    )
}

fn render(term: &str, products: &[Product], max_products: usize) -> Result<String, ProviderError> {
    if products.is_empty() {
        return Err(ProviderError::NoMatch(term.to_string()));
    }

    let rendered: Vec<String> = products
        .iter()
        .take(max_products)
        .enumerate()
        .map(|(i, p)| render_product(i, p, term))
        .collect();

    Ok(format!(
        "Search query: {}\nProducts found: {}\n\n{}",
        term,
        products.len(),
        rendered.join("\n\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn products() -> Vec<Product> {
        let body: SearchResponse = serde_json::from_value(serde_json::json!({
            "products": [
                {
                    "product_name": "Smoked Bacon",
                    "brands": "Acme",
                    "code": "0001",
                    "ingredients_text": "pork, salt, sodium nitrite",
                    "additives_tags": ["en:e250-sodium-nitrite", "en:e301"],
                    "nutrition_grades": "e",
                    "nova_group": 4,
                    "ecoscore_grade": "d"
                },
                {"product_name": "Bacon bits", "nova_group": "3"},
                {"product_name": "", "nova_group": 9},
                {"product_name": "Not rendered"}
            ]
        }))
        .unwrap();
        body.products
    }

    #[test]
    fn test_category_is_rendered_literally() {
        let text = render("bacon", &products(), 3).unwrap();
        assert!(text.contains("Processing Category: 4"));
        assert!(text.contains("Processing Category: 3"));
        assert!(text.contains("Products found: 4"));
    }

    #[test]
    fn test_out_of_range_category_is_unknown() {
        let text = render("bacon", &products(), 3).unwrap();
        assert!(text.contains("Product 3: bacon\n"));
        assert!(text.contains("Processing Category: Unknown"));
        assert!(!text.contains("Not rendered"));
    }

    #[test]
    fn test_tags_are_cleaned() {
        let text = render("bacon", &products(), 1).unwrap();
        assert!(text.contains("Additives: e250 sodium nitrite, e301"));
        assert!(text.contains("Allergens: None identified"));
        assert!(text.contains("Nutrition grade: E"));
    }

    #[test]
    fn test_no_products_is_no_match() {
        assert!(matches!(render("xyz", &[], 3), Err(ProviderError::NoMatch(t)) if t == "xyz"));
    }
}
