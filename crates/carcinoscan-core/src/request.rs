//! Request and response shapes at the ingress boundary.
//!
//! A request is either a single `{ "ingredients": ... }` object or a list of
//! `{ "product": ..., "ingredients": ... }` objects. The two forms are
//! discriminated explicitly in [`AnalysisRequest::from_json`]; anything else
//! is rejected with a [`RequestError`] that callers turn into an
//! [`ErrorEnvelope`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::Verdict;

/// Errors raised for malformed requests.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid request format: {0}")]
    InvalidShape(String),
}

/// Ingredients as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngredientSpec {
    /// Comma-separated list
    Text(String),
    /// Pre-split list (items may still contain commas)
    List(Vec<String>),
}

impl IngredientSpec {
    /// The input as a single string, for audit records.
    pub fn to_raw(&self) -> String {
        match self {
            IngredientSpec::Text(raw) => raw.clone(),
            IngredientSpec::List(items) => items.join(", "),
        }
    }
}

impl From<&str> for IngredientSpec {
    fn from(raw: &str) -> Self {
        IngredientSpec::Text(raw.to_string())
    }
}

/// One named product in a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRequest {
    pub product: String,
    pub ingredients: IngredientSpec,
}

/// A validated ingress request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisRequest {
    Single(IngredientSpec),
    Batch(Vec<ProductRequest>),
}

impl AnalysisRequest {
    /// Parse and discriminate a raw JSON body.
    pub fn parse(body: &str) -> Result<Self, RequestError> {
        let value: JsonValue = serde_json::from_str(body)?;
        Self::from_json(&value)
    }

    /// Discriminate an already-parsed JSON document.
    pub fn from_json(value: &JsonValue) -> Result<Self, RequestError> {
        match value {
            JsonValue::Object(map) => {
                let ingredients = map.get("ingredients").ok_or_else(|| {
                    RequestError::InvalidShape("missing 'ingredients' field".to_string())
                })?;
                Ok(AnalysisRequest::Single(parse_spec(ingredients, "ingredients")?))
            }
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| parse_product(index, item))
                .collect::<Result<Vec<_>, _>>()
                .map(AnalysisRequest::Batch),
            other => Err(RequestError::InvalidShape(format!(
                "expected an object or a list of products, got {}",
                json_kind(other)
            ))),
        }
    }
}

fn parse_product(index: usize, item: &JsonValue) -> Result<ProductRequest, RequestError> {
    let map = item.as_object().ok_or_else(|| {
        RequestError::InvalidShape(format!("batch item {} is not an object", index))
    })?;
    let product = map
        .get("product")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| {
            RequestError::InvalidShape(format!("batch item {} has no 'product' string", index))
        })?;
    let ingredients = map.get("ingredients").ok_or_else(|| {
        RequestError::InvalidShape(format!("batch item {} has no 'ingredients' field", index))
    })?;
    Ok(ProductRequest {
        product: product.to_string(),
        ingredients: parse_spec(ingredients, &format!("[{}].ingredients", index))?,
    })
}

fn parse_spec(value: &JsonValue, path: &str) -> Result<IngredientSpec, RequestError> {
    match value {
        JsonValue::String(s) => Ok(IngredientSpec::Text(s.clone())),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    RequestError::InvalidShape(format!("'{}' must contain only strings", path))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(IngredientSpec::List),
        other => Err(RequestError::InvalidShape(format!(
            "'{}' must be a string or a list of strings, got {}",
            path,
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}

/// Response for one ingredient list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// One verdict per requested ingredient, in request order
    pub ingredients: Vec<Verdict>,

    /// Present iff at least one score exceeds the high-risk threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    /// Whether the verdicts were served from cache
    pub cached: bool,
}

/// Structured error returned for malformed requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl From<&RequestError> for ErrorEnvelope {
    fn from(err: &RequestError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Any response the ingress surface can return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Single(Envelope),
    Batch(BTreeMap<String, Envelope>),
    Error(ErrorEnvelope),
}
