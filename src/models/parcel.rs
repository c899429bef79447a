use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder code some upstream order forms leave in the package field.
pub const PLACEHOLDER_TRACKING_NUMBER: &str = "code";

/// Station handling lifecycle. Variant order is the lifecycle order, so
/// `PartialOrd` answers "has the parcel reached this stage yet".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    Arrived,
    Verified,
    ReadyForDelivery,
    Assigned,
    Delivered,
}

impl ParcelStatus {
    pub const ALL: [ParcelStatus; 5] = [
        ParcelStatus::Arrived,
        ParcelStatus::Verified,
        ParcelStatus::ReadyForDelivery,
        ParcelStatus::Assigned,
        ParcelStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Arrived => "arrived",
            ParcelStatus::Verified => "verified",
            ParcelStatus::ReadyForDelivery => "ready_for_delivery",
            ParcelStatus::Assigned => "assigned",
            ParcelStatus::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParcelStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ParcelStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| format!("unknown parcel status: {raw}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parcel {
    pub id: Uuid,
    pub tracking_number: String,
    pub order_number: String,
    pub status: ParcelStatus,
    pub sender_name: String,
    pub sender_phone: String,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub description: Option<String>,
    pub station_id: String,
    pub station_name: String,
    pub arrived_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub assigned_to_driver_id: Option<String>,
    pub assigned_to_driver_name: Option<String>,
    pub notes: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
}

impl Parcel {
    pub fn has_valid_tracking_number(&self) -> bool {
        is_valid_tracking_number(&self.tracking_number)
    }

    /// Replaces the descriptive fields with the ones from a fresh intake.
    /// Identity, station, lifecycle and timestamps are left alone.
    pub fn refreshed_from(&self, intake: &NewParcel) -> Parcel {
        Parcel {
            sender_name: intake.sender_name.clone(),
            sender_phone: intake.sender_phone.clone(),
            receiver_name: intake.receiver_name.clone(),
            receiver_phone: intake.receiver_phone.clone(),
            receiver_address: intake.receiver_address.clone(),
            description: intake.description.clone(),
            order_date: intake.order_date,
            ..self.clone()
        }
    }
}

pub fn is_valid_tracking_number(code: &str) -> bool {
    let code = code.trim();
    !code.is_empty() && code != PLACEHOLDER_TRACKING_NUMBER
}

/// Everything intake knows about a parcel before the store assigns it an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParcel {
    pub tracking_number: String,
    pub order_number: String,
    pub sender_name: String,
    pub sender_phone: String,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub description: Option<String>,
    pub station_id: String,
    pub station_name: String,
    pub order_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Broadcast after every committed transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelEvent {
    pub parcel_id: Uuid,
    pub tracking_number: String,
    pub from: Option<ParcelStatus>,
    pub to: ParcelStatus,
    pub at: DateTime<Utc>,
}
