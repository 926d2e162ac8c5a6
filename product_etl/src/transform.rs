use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::clock::iso8601;
use crate::config::{DATA_SOURCE, PIPELINE_VERSION};
use crate::error::{EtlError, Result};
use crate::extract::json_type;

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "id", "title", "price", "rating", "stock", "brand", "category",
];

/// Output column order, matching the field order of [`EnrichedRow`].
pub const COLUMNS: [&str; 13] = [
    "id",
    "title",
    "price",
    "rating",
    "stock",
    "brand",
    "category",
    "price_category",
    "rating_category",
    "stock_status",
    "processed_at",
    "data_source",
    "pipeline_version",
];

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceCategory {
    Budget,
    Mid,
    Premium,
    Luxury,
}

impl PriceCategory {
    /// Bins are closed on the lower bound. Anything under 50, negatives
    /// included, is Budget.
    pub fn from_price(price: f64) -> Self {
        if price < 50.0 {
            PriceCategory::Budget
        } else if price < 100.0 {
            PriceCategory::Mid
        } else if price < 500.0 {
            PriceCategory::Premium
        } else {
            PriceCategory::Luxury
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingCategory {
    Excellent,
    Good,
    Fair,
}

impl RatingCategory {
    pub fn from_rating(rating: f64) -> Self {
        if rating >= 4.5 {
            RatingCategory::Excellent
        } else if rating >= 4.0 {
            RatingCategory::Good
        } else {
            RatingCategory::Fair
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "In Stock")]
    InStock,
}

impl StockStatus {
    /// A negative count means nothing is on hand.
    pub fn from_stock(stock: i64) -> Self {
        match stock {
            i64::MIN..=0 => StockStatus::OutOfStock,
            1..=9 => StockStatus::LowStock,
            _ => StockStatus::InStock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub id: Option<String>,
    pub title: Option<String>,
    pub price: f64,
    pub rating: f64,
    pub stock: i64,
    pub brand: String,
    pub category: String,
    pub price_category: PriceCategory,
    pub rating_category: RatingCategory,
    pub stock_status: StockStatus,
    pub processed_at: String,
    pub data_source: String,
    pub pipeline_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformSummary {
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug)]
pub struct Transformed {
    pub rows: Vec<EnrichedRow>,
    pub summary: TransformSummary,
}

/// Enriches every record. Missing or unparseable fields fall back to their
/// defaults; only a record that is not a JSON object is an error.
pub fn transform(records: &[Value], invoked_at: DateTime<Utc>) -> Result<Transformed> {
    let objects = records
        .iter()
        .enumerate()
        .map(|(index, record)| match record {
            Value::Object(map) => Ok(map),
            other => Err(EtlError::Transform(format!(
                "record {index} is {}, expected an object",
                json_type(other)
            ))),
        })
        .collect::<Result<Vec<_>>>()
        .inspect_err(|e| warn!("{}", e))?;

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|column| !objects.iter().any(|map| map.contains_key(*column)))
        .collect();
    if !missing.is_empty() {
        warn!("Missing columns in data: {:?}", missing);
    }

    let processed_at = iso8601(invoked_at);
    let rows: Vec<EnrichedRow> = objects
        .into_iter()
        .map(|map| enrich(map, &processed_at))
        .collect();

    info!("Data transformation completed successfully");
    Ok(Transformed {
        summary: TransformSummary {
            rows: rows.len(),
            columns: COLUMNS.len(),
        },
        rows,
    })
}

fn enrich(record: &Map<String, Value>, processed_at: &str) -> EnrichedRow {
    let price = float(record.get("price")).unwrap_or(0.0);
    let rating = float(record.get("rating")).unwrap_or(0.0);
    let stock = integer(record.get("stock")).unwrap_or(0);

    EnrichedRow {
        id: label(record.get("id")),
        title: label(record.get("title")),
        price,
        rating,
        stock,
        brand: text(record.get("brand")).unwrap_or_else(|| UNKNOWN.to_string()),
        category: text(record.get("category")).unwrap_or_else(|| UNKNOWN.to_string()),
        price_category: PriceCategory::from_price(price),
        rating_category: RatingCategory::from_rating(rating),
        stock_status: StockStatus::from_stock(stock),
        processed_at: processed_at.to_string(),
        data_source: DATA_SOURCE.to_string(),
        pipeline_version: PIPELINE_VERSION.to_string(),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// An empty id or title reads back from CSV as missing, so it is missing here too.
fn label(value: Option<&Value>) -> Option<String> {
    text(value).filter(|s| !s.is_empty())
}

fn float(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| !v.is_nan())
}

fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

// Past 2^53 an f64 no longer holds every integer exactly.
fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() <= 9_007_199_254_740_992.0)
        .then(|| value as i64)
}
