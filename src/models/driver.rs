use serde::{Deserialize, Serialize};

/// Status values the courier directory accepts on update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[serde(rename = "type")]
    pub vehicle_type: String,
    #[serde(default)]
    pub plate_number: Option<String>,
}

/// Courier record as the external directory stores it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourierRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub is_online: bool,
    pub is_active: bool,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(default)]
    pub current_deliveries_count: u32,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Read-side projection of a courier used by dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Driver {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub rating: f64,
    pub vehicle_type: Option<String>,
    pub is_available: bool,
    pub current_deliveries_count: u32,
}

impl From<CourierRecord> for Driver {
    fn from(record: CourierRecord) -> Self {
        let name = format!("{} {}", record.first_name.trim(), record.last_name.trim())
            .trim()
            .to_string();
        let vehicle_type = record
            .vehicles
            .into_iter()
            .next()
            .map(|vehicle| vehicle.vehicle_type);

        Driver {
            user_id: record.user_id.unwrap_or_else(|| record.id.clone()),
            id: record.id,
            name,
            phone: record.phone,
            rating: record.rating,
            vehicle_type,
            is_available: record.is_online && record.is_active,
            current_deliveries_count: record.current_deliveries_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CourierRecord, Driver, Vehicle};

    fn record(is_online: bool, is_active: bool) -> CourierRecord {
        CourierRecord {
            id: "D1".to_string(),
            first_name: "Awa".to_string(),
            last_name: "Kone ".to_string(),
            phone: "+2250700000001".to_string(),
            is_online,
            is_active,
            rating: 4.7,
            vehicles: vec![Vehicle {
                vehicle_type: "motorbike".to_string(),
                plate_number: None,
            }],
            current_deliveries_count: 2,
            user_id: None,
        }
    }

    #[test]
    fn availability_requires_online_and_active() {
        assert!(Driver::from(record(true, true)).is_available);
        assert!(!Driver::from(record(true, false)).is_available);
        assert!(!Driver::from(record(false, true)).is_available);
    }

    #[test]
    fn projection_joins_name_and_takes_first_vehicle() {
        let driver = Driver::from(record(true, true));
        assert_eq!(driver.name, "Awa Kone");
        assert_eq!(driver.vehicle_type.as_deref(), Some("motorbike"));
        assert_eq!(driver.user_id, "D1");
    }
}
