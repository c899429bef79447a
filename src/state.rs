use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::directory::DriverDirectory;
use crate::engine::dispatch::DispatchWorkflow;
use crate::engine::notifications::{Notification, NotificationQueue};
use crate::intake::OrderIntakeAdapter;
use crate::observability::metrics::Metrics;
use crate::ports::{BlobStorage, DirectoryApi, PackageStatusApi};
use crate::store::ParcelStore;

/// External systems the application is wired against.
pub struct Collaborators {
    pub package_api: Arc<dyn PackageStatusApi>,
    pub directory_api: Arc<dyn DirectoryApi>,
    pub storage: Arc<dyn BlobStorage>,
}

pub struct AppState {
    pub store: Arc<ParcelStore>,
    pub directory: Arc<DriverDirectory>,
    pub workflow: DispatchWorkflow,
    pub intake: OrderIntakeAdapter,
    pub metrics: Metrics,
}

impl AppState {
    /// Builds the application graph once. The returned receiver feeds the
    /// notification worker.
    pub fn new(config: &Config, collaborators: Collaborators) -> (Self, mpsc::Receiver<Notification>) {
        let metrics = Metrics::new();
        let gazetteer = config.zones.clone().unwrap_or_default();

        let store = Arc::new(ParcelStore::new(
            collaborators.storage,
            collaborators.package_api,
            config.storage_key(),
            metrics.clone(),
            config.event_buffer_size,
        ));
        let directory = Arc::new(DriverDirectory::new(collaborators.directory_api));
        let (notifications, notification_rx) =
            NotificationQueue::new(config.notification_queue_size, metrics.clone());

        let workflow = DispatchWorkflow::new(
            store.clone(),
            directory.clone(),
            Arc::new(gazetteer),
            notifications,
            metrics.clone(),
        );
        let intake = OrderIntakeAdapter::new(
            store.clone(),
            config.station_id.clone(),
            config.station_name.clone(),
        );

        (
            Self {
                store,
                directory,
                workflow,
                intake,
                metrics,
            },
            notification_rx,
        )
    }
}
