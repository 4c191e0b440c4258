//! Recommendation query parsing.
//!
//! Converts raw request parameters (`?types=Red,White&minPrice=20`) into a
//! typed `RecommendationFilter`:
//! - comma-separated list parameters
//! - numeric price / rating bounds with defaults
//! - strict wine type labels

use std::collections::HashMap;
use thiserror::Error;
use vinolink_model::{
    default_max_price, default_min_price, default_min_rating, RecommendationFilter, WineType,
};

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Invalid number for {param}: {value:?}")]
    InvalidNumber { param: String, value: String },
    #[error("Negative price for {param}: {value}")]
    NegativePrice { param: String, value: f32 },
    #[error("minPrice {min} is greater than maxPrice {max}")]
    InvalidPriceRange { min: f32, max: f32 },
    #[error("minRating must be between 0 and 5, got {0}")]
    InvalidRating(f32),
    #[error("Unknown wine type: {0}")]
    UnknownWineType(String),
    #[error("Malformed query string: {0}")]
    MalformedQuery(String),
}

/// Split a comma-separated parameter into trimmed, non-empty items.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(params: &HashMap<String, String>, param: &str, default: f32) -> Result<f32, QueryError> {
    match params.get(param).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<f32>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| QueryError::InvalidNumber {
                param: param.to_string(),
                value: raw.to_string(),
            }),
    }
}

fn parse_price(params: &HashMap<String, String>, param: &str, default: f32) -> Result<f32, QueryError> {
    let value = parse_number(params, param, default)?;
    if value < 0.0 {
        return Err(QueryError::NegativePrice {
            param: param.to_string(),
            value,
        });
    }
    Ok(value)
}

/// Build a filter from decoded query parameters. Missing parameters take
/// their defaults; malformed ones are errors rather than silently ignored.
pub fn parse_filters(params: &HashMap<String, String>) -> Result<RecommendationFilter, QueryError> {
    let types = split_list(params.get("types").map(String::as_str))
        .into_iter()
        .map(|label| WineType::from_label(&label).ok_or(QueryError::UnknownWineType(label)))
        .collect::<Result<Vec<_>, _>>()?;

    let min_price = parse_price(params, "minPrice", default_min_price())?;
    let max_price = parse_price(params, "maxPrice", default_max_price())?;
    if min_price > max_price {
        return Err(QueryError::InvalidPriceRange {
            min: min_price,
            max: max_price,
        });
    }

    let min_rating = parse_number(params, "minRating", default_min_rating())?;
    if !(0.0..=5.0).contains(&min_rating) {
        return Err(QueryError::InvalidRating(min_rating));
    }

    Ok(RecommendationFilter {
        search: params.get("search").map(|s| s.trim().to_string()).unwrap_or_default(),
        types,
        varietals: split_list(params.get("varietals").map(String::as_str)),
        countries: split_list(params.get("countries").map(String::as_str)),
        sub_regions: split_list(params.get("subRegions").map(String::as_str)),
        min_price,
        max_price,
        min_rating,
        store_id: params
            .get("storeId")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    })
}

/// Decode a raw `a=1&b=2` query string. Later duplicates win.
pub fn parse_query_string(raw: &str) -> Result<HashMap<String, String>, QueryError> {
    let decode = |part: &str| {
        urlencoding::decode(&part.replace('+', " "))
            .map(|s| s.into_owned())
            .map_err(|_| QueryError::MalformedQuery(part.to_string()))
    };

    raw.trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<(String, String), QueryError> {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode(key)?, decode(value)?))
        })
        .collect()
}
