use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::directory::DriverDirectory;
use crate::engine::notifications::{Notification, NotificationQueue};
use crate::error::DispatchError;
use crate::models::driver::Driver;
use crate::models::parcel::{Parcel, ParcelStatus, Verification};
use crate::observability::metrics::Metrics;
use crate::store::ParcelStore;
use crate::zones::{Gazetteer, ZoneGroup};

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutcome {
    pub parcel: Parcel,
    pub driver: Driver,
    pub notifications_queued: usize,
}

/// Operator-facing dispatch flow: verify, mark ready, assign, then hand the
/// courier notifications to the post-commit queue.
#[derive(Clone)]
pub struct DispatchWorkflow {
    store: Arc<ParcelStore>,
    directory: Arc<DriverDirectory>,
    gazetteer: Arc<Gazetteer>,
    notifications: NotificationQueue,
    metrics: Metrics,
}

impl DispatchWorkflow {
    pub fn new(
        store: Arc<ParcelStore>,
        directory: Arc<DriverDirectory>,
        gazetteer: Arc<Gazetteer>,
        notifications: NotificationQueue,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            directory,
            gazetteer,
            notifications,
            metrics,
        }
    }

    pub async fn verify(&self, parcel_id: Uuid, verification: Verification) -> Result<Parcel, DispatchError> {
        self.detached(move |workflow| async move {
            workflow
                .observe("verify", parcel_id, workflow.store.verify(parcel_id, verification))
                .await
        })
        .await
    }

    pub async fn mark_ready(&self, parcel_id: Uuid) -> Result<Parcel, DispatchError> {
        self.detached(move |workflow| async move {
            workflow
                .observe("mark_ready", parcel_id, workflow.store.mark_ready(parcel_id))
                .await
        })
        .await
    }

    pub async fn record_delivered(&self, parcel_id: Uuid) -> Result<Parcel, DispatchError> {
        self.detached(move |workflow| async move {
            workflow
                .observe("delivered", parcel_id, workflow.store.record_delivered(parcel_id))
                .await
        })
        .await
    }

    /// Assigns a ready parcel to a courier. Success is returned once the
    /// parcel is committed; the courier load nudge and notifications that
    /// follow never turn it into a failure.
    pub async fn assign(&self, parcel_id: Uuid, driver_id: &str) -> Result<AssignmentOutcome, DispatchError> {
        let driver_id = driver_id.to_string();
        self.detached(move |workflow| async move { workflow.assign_now(parcel_id, &driver_id).await })
            .await
    }

    async fn assign_now(&self, parcel_id: Uuid, driver_id: &str) -> Result<AssignmentOutcome, DispatchError> {
        let (parcel, driver) = self
            .observe("assign", parcel_id, async {
                let parcel = self.store.get(parcel_id).await?;
                if parcel.status != ParcelStatus::ReadyForDelivery {
                    return Err(DispatchError::NotReadyForAssignment(parcel.status));
                }

                let driver = self.directory.find(driver_id).await?;
                let parcel = self.store.assign(parcel_id, &driver).await?;
                Ok((parcel, driver))
            })
            .await?;

        info!(
            parcel_id = %parcel.id,
            tracking_number = %parcel.tracking_number,
            driver_id = %driver.id,
            "parcel assigned"
        );

        let notifications_queued = match self.directory.increment_load(&driver.id).await {
            Ok(_) => self.notify_driver(&driver, &parcel),
            Err(err) => {
                warn!(
                    driver_id = %driver.id,
                    error = %err,
                    "failed to update driver load; skipping notifications"
                );
                0
            }
        };

        Ok(AssignmentOutcome {
            parcel,
            driver,
            notifications_queued,
        })
    }

    /// Parcels in `status` grouped by delivery zone.
    pub async fn zone_board(&self, status: ParcelStatus) -> Result<Vec<ZoneGroup<Parcel>>, DispatchError> {
        let parcels = self.store.list_by_status(status).await?;
        Ok(self.gazetteer.group_by_zone(&parcels))
    }

    fn notify_driver(&self, driver: &Driver, parcel: &Parcel) -> usize {
        let message = format!(
            "New parcel {} assigned to you: deliver to {} ({}), {}",
            parcel.tracking_number,
            parcel.receiver_name,
            parcel.receiver_phone,
            parcel.receiver_address
        );

        let attempts = [
            Notification::Sms {
                phone: driver.phone.clone(),
                message: message.clone(),
            },
            Notification::Push {
                user_id: driver.user_id.clone(),
                title: "New delivery".to_string(),
                message,
            },
        ];

        attempts
            .into_iter()
            .filter(|notification| self.notifications.enqueue(notification.clone()))
            .count()
    }

    /// Runs a transition on its own task so that a caller giving up on the
    /// result does not cancel the upstream call or the commit.
    async fn detached<T, F, Fut>(&self, operation: F) -> Result<T, DispatchError>
    where
        F: FnOnce(DispatchWorkflow) -> Fut,
        Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::spawn(operation(self.clone())).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(DispatchError::Interrupted(err.to_string())),
        }
    }

    async fn observe<T, F>(&self, transition: &'static str, parcel_id: Uuid, operation: F) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, DispatchError>>,
    {
        let start = Instant::now();
        let result = operation.await;
        let elapsed = start.elapsed().as_secs_f64();

        match &result {
            Ok(_) => self.metrics.record_transition(transition, "success", elapsed),
            Err(err) => {
                self.metrics.record_transition(transition, err.code(), elapsed);
                warn!(transition, parcel_id = %parcel_id, error = %err, "transition failed");
            }
        }

        result
    }
}
