/// Shared data structures for the application state
///
/// These structs represent the catalog data that flows between
/// the garage store, the persisted envelope and the CLI.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Image shown when a vehicle has no photos
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

/// Nullable catalog columns arrive as `null`; treat that like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Import condition of a vehicle
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    ForeignUsed,
    BrandNew,
    #[default]
    PreOwned,
}

/// A catalog vehicle
///
/// Vehicles are supplied by the catalog; the garage only keeps
/// snapshots of the ones a user has liked. Fields the catalog sends
/// that are not modelled here are kept in `extra` so a snapshot
/// serializes back exactly as it was received.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Vehicle {
    /// Unique catalog identifier
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    /// Price in the base unit (USD)
    pub price: f64,
    /// Photo URLs or inline data URIs, cover image first
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub mileage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transmission: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fuel_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition: Condition,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_duty_paid: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vin_verified: bool,
    /// Listing status, e.g. "available" or "sold"
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_installment_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_installment_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,

    /// Display fields this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Vehicle {
    /// Create a vehicle with only the fields the garage cares about
    pub fn new(
        id: impl Into<String>,
        make: impl Into<String>,
        model: impl Into<String>,
        year: i32,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            make: make.into(),
            model: model.into(),
            year,
            price,
            images: Vec::new(),
            mileage: 0.0,
            transmission: String::new(),
            fuel_type: String::new(),
            condition: Condition::default(),
            is_duty_paid: false,
            vin_verified: false,
            status: "available".to_string(),
            created_at: None,
            description: None,
            engine_size: None,
            vin: None,
            is_installment_available: None,
            monthly_installment_value: None,
            view_count: None,
            extra: Map::new(),
        }
    }

    /// "2019 Toyota Camry"
    pub fn title(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }

    pub fn is_sold(&self) -> bool {
        self.status.eq_ignore_ascii_case("sold")
    }

    /// First photo, or the placeholder when the listing has none
    pub fn cover_image(&self) -> &str {
        self.images
            .first()
            .map(String::as_str)
            .unwrap_or(PLACEHOLDER_IMAGE)
    }

    /// Parse a vehicle from catalog JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Currency used when showing prices
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    #[default]
    Ghs,
}

impl Currency {
    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Ghs => "₵",
        }
    }

    /// Format a USD base price, converting with `exchange_rate` for GHS
    ///
    /// Amounts are rounded to whole units and grouped by thousands.
    pub fn format_price(self, amount: f64, exchange_rate: f64) -> String {
        let rate = match self {
            Currency::Usd => 1.0,
            Currency::Ghs => exchange_rate,
        };
        let converted = (amount * rate).round();
        let sign = if converted < 0.0 { "-" } else { "" };
        format!("{}{}{}", sign, self.symbol(), group_thousands(converted.abs() as u64))
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
