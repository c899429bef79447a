use std::sync::Arc;

use tracing::{debug, info};

use crate::error::DispatchError;
use crate::models::driver::{CourierStatus, Driver};
use crate::ports::{DirectoryApi, PortError};

/// Courier lookups against the external directory. Nothing is cached, so
/// availability is as fresh as the last call.
pub struct DriverDirectory {
    api: Arc<dyn DirectoryApi>,
}

impl DriverDirectory {
    pub fn new(api: Arc<dyn DirectoryApi>) -> Self {
        Self { api }
    }

    /// All couriers, including unavailable ones, so callers can show why a
    /// courier cannot be picked.
    pub async fn list_available(&self) -> Result<Vec<Driver>, DispatchError> {
        let drivers: Vec<Driver> = self
            .api
            .list_all()
            .await
            .map_err(|err| DispatchError::Upstream(err.to_string()))?
            .into_iter()
            .map(Driver::from)
            .collect();

        debug!(
            drivers = drivers.len(),
            available = drivers.iter().filter(|d| d.is_available).count(),
            "drivers listed"
        );
        Ok(drivers)
    }

    pub async fn find(&self, driver_id: &str) -> Result<Driver, DispatchError> {
        self.list_available()
            .await?
            .into_iter()
            .find(|driver| driver.id == driver_id)
            .ok_or_else(|| DispatchError::DriverNotFound(driver_id.to_string()))
    }

    /// Marks the courier busy. Not a counter: concurrent calls are not
    /// serialized against each other.
    pub async fn increment_load(&self, driver_id: &str) -> Result<Driver, DispatchError> {
        let record = self
            .api
            .update_status(driver_id, CourierStatus::Busy)
            .await
            .map_err(|err| match err {
                PortError::NotFound(_) => DispatchError::DriverNotFound(driver_id.to_string()),
                other => DispatchError::Upstream(other.to_string()),
            })?;

        let driver = Driver::from(record);
        info!(
            driver_id = %driver.id,
            deliveries = driver.current_deliveries_count,
            "driver load incremented"
        );
        Ok(driver)
    }
}
