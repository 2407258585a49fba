//! Read-side views of procurement records used by the dashboard.
//!
//! Only the fields the aggregations need are modeled; unknown fields are
//! ignored and missing ones fall back to defaults.

use serde::{Deserialize, Deserializer};

/// Accepts numbers and numeric strings; anything else becomes 0.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseOrder {
    pub id: String,
    pub vendor_id: Option<String>,
    pub status: String,
    #[serde(deserialize_with = "lenient_amount")]
    pub total_amount: f64,
    pub order_date: Option<String>,
    pub created_at: Option<String>,
}

impl PurchaseOrder {
    /// The date spend is attributed to: `orderDate`, else `createdAt`.
    pub fn spend_date(&self) -> Option<&str> {
        self.order_date.as_deref().or(self.created_at.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tender {
    pub id: String,
    pub status: String,
    #[serde(deserialize_with = "lenient_amount")]
    pub estimated_value: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shipment {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Invoice {
    pub id: String,
    pub status: String,
    #[serde(deserialize_with = "lenient_amount")]
    pub amount: f64,
    pub due_date: Option<String>,
}

/// Anything with a status string.
pub trait HasStatus {
    fn status(&self) -> &str;
}

macro_rules! impl_has_status {
    ($($ty:ty),*) => {
        $(impl HasStatus for $ty {
            fn status(&self) -> &str {
                &self.status
            }
        })*
    };
}

impl_has_status!(PurchaseOrder, Vendor, Tender, Shipment, Invoice);
