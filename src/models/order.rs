use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer order as supplied by the order source. Intake only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_number: String,
    pub sender_name: String,
    pub sender_phone: String,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub delivery_address: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub package_codes: Vec<String>,
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
}
