use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OnceCell, RwLock, broadcast};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::driver::Driver;
use crate::models::parcel::{NewParcel, Parcel, ParcelEvent, ParcelStatus, Verification};
use crate::observability::metrics::Metrics;
use crate::ports::{AssignmentPayload, BlobStorage, PackageStatusApi};

type Snapshot = Arc<Vec<Parcel>>;

/// Owner of the parcel collection and its status transitions.
///
/// The collection is hydrated from blob storage on first use and afterwards
/// only written back. Readers always receive a whole immutable snapshot; a
/// transition builds a new vector with the changed parcel swapped in.
///
/// Transitions that call the package API do so before touching local state
/// and commit only on success. The commit re-checks the source status under
/// the write lock, so of two racing transitions on one parcel only the first
/// to commit wins.
pub struct ParcelStore {
    storage: Arc<dyn BlobStorage>,
    package_api: Arc<dyn PackageStatusApi>,
    storage_key: String,
    parcels: OnceCell<RwLock<Snapshot>>,
    save_lock: Mutex<()>,
    events_tx: broadcast::Sender<ParcelEvent>,
    metrics: Metrics,
}

impl ParcelStore {
    pub fn new(
        storage: Arc<dyn BlobStorage>,
        package_api: Arc<dyn PackageStatusApi>,
        storage_key: impl Into<String>,
        metrics: Metrics,
        event_buffer_size: usize,
    ) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            storage,
            package_api,
            storage_key: storage_key.into(),
            parcels: OnceCell::new(),
            save_lock: Mutex::new(()),
            events_tx,
            metrics,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ParcelEvent> {
        self.events_tx.subscribe()
    }

    async fn collection(&self) -> Result<&RwLock<Snapshot>, DispatchError> {
        self.parcels
            .get_or_try_init(|| async {
                let parcels = match self.storage.load(&self.storage_key).await? {
                    Some(blob) => serde_json::from_str::<Vec<Parcel>>(&blob).map_err(|err| {
                        DispatchError::Storage(format!(
                            "corrupt snapshot under {}: {err}",
                            self.storage_key
                        ))
                    })?,
                    None => Vec::new(),
                };

                info!(key = %self.storage_key, parcels = parcels.len(), "parcel store hydrated");
                self.metrics.set_status_counts(&status_counts(&parcels));
                Ok::<_, DispatchError>(RwLock::new(Arc::new(parcels)))
            })
            .await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, DispatchError> {
        let collection = self.collection().await?;
        Ok(collection.read().await.clone())
    }

    pub async fn list(&self) -> Result<Vec<Parcel>, DispatchError> {
        Ok(self.snapshot().await?.to_vec())
    }

    pub async fn get(&self, id: Uuid) -> Result<Parcel, DispatchError> {
        self.snapshot()
            .await?
            .iter()
            .find(|parcel| parcel.id == id)
            .cloned()
            .ok_or(DispatchError::ParcelNotFound(id))
    }

    pub async fn list_by_status(&self, status: ParcelStatus) -> Result<Vec<Parcel>, DispatchError> {
        Ok(self
            .snapshot()
            .await?
            .iter()
            .filter(|parcel| parcel.status == status)
            .cloned()
            .collect())
    }

    pub async fn assigned_to(&self, driver_id: &str) -> Result<Vec<Parcel>, DispatchError> {
        Ok(self
            .snapshot()
            .await?
            .iter()
            .filter(|parcel| parcel.assigned_to_driver_id.as_deref() == Some(driver_id))
            .cloned()
            .collect())
    }

    pub async fn stats(&self) -> Result<BTreeMap<ParcelStatus, usize>, DispatchError> {
        let snapshot = self.snapshot().await?;
        Ok(status_counts(&snapshot).into_iter().collect())
    }

    /// Registers a parcel at intake. An order number that is already known
    /// refreshes the descriptive fields of the existing parcel instead.
    pub async fn create(&self, new: NewParcel) -> Result<Parcel, DispatchError> {
        let collection = self.collection().await?;
        let mut guard = collection.write().await;

        let existing = guard
            .iter()
            .find(|parcel| !new.order_number.is_empty() && parcel.order_number == new.order_number)
            .cloned();

        let (parcel, next, created) = match existing {
            Some(existing) => {
                let refreshed = existing.refreshed_from(&new);
                let next = replace_by_id(&guard, &refreshed);
                (refreshed, next, false)
            }
            None => {
                let parcel = Parcel {
                    id: Uuid::new_v4(),
                    tracking_number: new.tracking_number,
                    order_number: new.order_number,
                    status: ParcelStatus::Arrived,
                    sender_name: new.sender_name,
                    sender_phone: new.sender_phone,
                    receiver_name: new.receiver_name,
                    receiver_phone: new.receiver_phone,
                    receiver_address: new.receiver_address,
                    description: new.description,
                    station_id: new.station_id,
                    station_name: new.station_name,
                    arrived_at: Utc::now(),
                    verified_at: None,
                    assigned_at: None,
                    delivered_at: None,
                    assigned_to_driver_id: None,
                    assigned_to_driver_name: None,
                    notes: None,
                    order_date: new.order_date,
                };
                let mut next = guard.to_vec();
                next.push(parcel.clone());
                (parcel, next, true)
            }
        };

        let snapshot = Arc::new(next);
        *guard = snapshot.clone();
        let save_guard = self.save_lock.lock().await;
        drop(guard);
        self.persist(&snapshot).await;
        drop(save_guard);

        if created {
            info!(parcel_id = %parcel.id, tracking_number = %parcel.tracking_number, "parcel arrived");
            self.publish(None, &parcel);
        } else {
            info!(parcel_id = %parcel.id, order_number = %parcel.order_number, "parcel refreshed from re-intake");
        }

        Ok(parcel)
    }

    pub async fn verify(&self, id: Uuid, verification: Verification) -> Result<Parcel, DispatchError> {
        let parcel = self.get(id).await?;
        if parcel.status != ParcelStatus::Arrived {
            return Err(DispatchError::InvalidState {
                expected: ParcelStatus::Arrived,
                actual: parcel.status,
            });
        }
        if !verification.verified {
            return Err(DispatchError::VerificationRejected);
        }

        self.commit(
            id,
            ParcelStatus::Arrived,
            |actual| DispatchError::InvalidState {
                expected: ParcelStatus::Arrived,
                actual,
            },
            |current| Parcel {
                status: ParcelStatus::Verified,
                verified_at: Some(Utc::now()),
                notes: verification.notes.or_else(|| current.notes.clone()),
                ..current.clone()
            },
        )
        .await
    }

    pub async fn mark_ready(&self, id: Uuid) -> Result<Parcel, DispatchError> {
        let parcel = self.get(id).await?;
        if !parcel.has_valid_tracking_number() {
            return Err(DispatchError::InvalidTrackingNumber(parcel.tracking_number));
        }
        if parcel.status != ParcelStatus::Verified {
            return Err(DispatchError::InvalidState {
                expected: ParcelStatus::Verified,
                actual: parcel.status,
            });
        }

        self.package_api
            .mark_ready(&parcel.tracking_number)
            .await
            .map_err(|err| DispatchError::Upstream(err.to_string()))?;

        self.commit(
            id,
            ParcelStatus::Verified,
            |actual| DispatchError::InvalidState {
                expected: ParcelStatus::Verified,
                actual,
            },
            |current| Parcel {
                status: ParcelStatus::ReadyForDelivery,
                ..current.clone()
            },
        )
        .await
    }

    pub async fn assign(&self, id: Uuid, driver: &Driver) -> Result<Parcel, DispatchError> {
        let parcel = self.get(id).await?;
        if parcel.status != ParcelStatus::ReadyForDelivery {
            return Err(DispatchError::NotReadyForAssignment(parcel.status));
        }
        if !driver.is_available {
            return Err(DispatchError::DriverUnavailable(driver.id.clone()));
        }

        let payload = AssignmentPayload {
            driver_id: driver.id.clone(),
            driver_name: driver.name.clone(),
        };
        self.package_api
            .assign(&parcel.tracking_number, &payload)
            .await
            .map_err(|err| DispatchError::Upstream(err.to_string()))?;

        self.commit(
            id,
            ParcelStatus::ReadyForDelivery,
            DispatchError::NotReadyForAssignment,
            |current| Parcel {
                status: ParcelStatus::Assigned,
                assigned_to_driver_id: Some(payload.driver_id.clone()),
                assigned_to_driver_name: Some(payload.driver_name.clone()),
                assigned_at: Some(Utc::now()),
                ..current.clone()
            },
        )
        .await
        .inspect_err(|err| {
            if matches!(err, DispatchError::NotReadyForAssignment(_)) {
                warn!(
                    parcel_id = %id,
                    driver_id = %driver.id,
                    "assignment lost a race after the upstream call succeeded"
                );
            }
        })
    }

    /// Applies the courier-side delivery confirmation.
    pub async fn record_delivered(&self, id: Uuid) -> Result<Parcel, DispatchError> {
        self.commit(
            id,
            ParcelStatus::Assigned,
            |actual| DispatchError::InvalidState {
                expected: ParcelStatus::Assigned,
                actual,
            },
            |current| Parcel {
                status: ParcelStatus::Delivered,
                delivered_at: Some(Utc::now()),
                ..current.clone()
            },
        )
        .await
    }

    async fn commit<C, F>(
        &self,
        id: Uuid,
        expected: ParcelStatus,
        conflict: C,
        apply: F,
    ) -> Result<Parcel, DispatchError>
    where
        C: FnOnce(ParcelStatus) -> DispatchError,
        F: FnOnce(&Parcel) -> Parcel,
    {
        let collection = self.collection().await?;
        let mut guard = collection.write().await;

        let current = guard
            .iter()
            .find(|parcel| parcel.id == id)
            .ok_or(DispatchError::ParcelNotFound(id))?;
        if current.status != expected {
            return Err(conflict(current.status));
        }

        let updated = apply(current);
        let snapshot = Arc::new(replace_by_id(&guard, &updated));
        *guard = snapshot.clone();

        // Take the save lock before releasing the write lock so snapshots
        // reach storage in commit order.
        let save_guard = self.save_lock.lock().await;
        drop(guard);
        self.persist(&snapshot).await;
        drop(save_guard);

        info!(
            parcel_id = %updated.id,
            tracking_number = %updated.tracking_number,
            from = %expected,
            to = %updated.status,
            "parcel transitioned"
        );
        self.publish(Some(expected), &updated);

        Ok(updated)
    }

    async fn persist(&self, snapshot: &[Parcel]) {
        self.metrics.set_status_counts(&status_counts(snapshot));

        let blob = match serde_json::to_string(snapshot) {
            Ok(blob) => blob,
            Err(err) => {
                error!(error = %err, "failed to serialize parcel snapshot");
                return;
            }
        };

        match self.storage.save(&self.storage_key, &blob).await {
            Ok(()) => debug!(key = %self.storage_key, parcels = snapshot.len(), "parcel snapshot saved"),
            Err(err) => error!(key = %self.storage_key, error = %err, "failed to save parcel snapshot"),
        }
    }

    fn publish(&self, from: Option<ParcelStatus>, parcel: &Parcel) {
        let _ = self.events_tx.send(ParcelEvent {
            parcel_id: parcel.id,
            tracking_number: parcel.tracking_number.clone(),
            from,
            to: parcel.status,
            at: Utc::now(),
        });
    }
}

fn replace_by_id(parcels: &[Parcel], updated: &Parcel) -> Vec<Parcel> {
    parcels
        .iter()
        .map(|parcel| {
            if parcel.id == updated.id {
                updated.clone()
            } else {
                parcel.clone()
            }
        })
        .collect()
}

fn status_counts(parcels: &[Parcel]) -> Vec<(ParcelStatus, usize)> {
    ParcelStatus::ALL
        .into_iter()
        .map(|status| {
            let count = parcels.iter().filter(|parcel| parcel.status == status).count();
            (status, count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Barrier;

    use super::ParcelStore;
    use crate::adapters::simulated::{PackageState, SimulatedBackend};
    use crate::adapters::storage::MemoryBlobStorage;
    use crate::error::DispatchError;
    use crate::models::driver::Driver;
    use crate::models::parcel::{NewParcel, Parcel, ParcelStatus, Verification};
    use crate::observability::metrics::Metrics;
    use crate::ports::{AssignmentPayload, BlobStorage, PackageStatusApi, PortError, PortResult};

    const KEY: &str = "parcels:station-1";

    fn new_parcel(order_number: &str, tracking_number: &str) -> NewParcel {
        NewParcel {
            tracking_number: tracking_number.to_string(),
            order_number: order_number.to_string(),
            sender_name: "Boutique Akwaba".to_string(),
            sender_phone: "+2250101010101".to_string(),
            receiver_name: "Fatou Diallo".to_string(),
            receiver_phone: "+2250202020202".to_string(),
            receiver_address: "Rue X, Cocody".to_string(),
            description: Some("shoes".to_string()),
            station_id: "station-1".to_string(),
            station_name: "Main Station".to_string(),
            order_date: None,
        }
    }

    fn driver(id: &str, is_available: bool) -> Driver {
        Driver {
            id: id.to_string(),
            user_id: format!("user-{id}"),
            name: "Awa Kone".to_string(),
            phone: "+2250700000001".to_string(),
            rating: 4.8,
            vehicle_type: Some("motorbike".to_string()),
            is_available,
            current_deliveries_count: 0,
        }
    }

    fn setup() -> (ParcelStore, Arc<SimulatedBackend>, Arc<MemoryBlobStorage>) {
        let backend = Arc::new(SimulatedBackend::new(Duration::ZERO));
        let storage = Arc::new(MemoryBlobStorage::new());
        let store = ParcelStore::new(storage.clone(), backend.clone(), KEY, Metrics::new(), 16);
        (store, backend, storage)
    }

    fn verified() -> Verification {
        Verification {
            verified: true,
            notes: Some("box intact".to_string()),
        }
    }

    fn assert_timestamps(parcel: &Parcel) {
        assert_eq!(
            parcel.verified_at.is_some(),
            parcel.status >= ParcelStatus::Verified
        );
        assert_eq!(
            parcel.assigned_at.is_some(),
            parcel.status >= ParcelStatus::Assigned
        );
        assert_eq!(
            parcel.assigned_to_driver_id.is_some(),
            parcel.status >= ParcelStatus::Assigned
        );
    }

    async fn ready_parcel(store: &ParcelStore) -> Parcel {
        let parcel = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();
        store.verify(parcel.id, verified()).await.unwrap();
        store.mark_ready(parcel.id).await.unwrap()
    }

    #[tokio::test]
    async fn lifecycle_moves_forward_and_keeps_timestamps_consistent() {
        let (store, backend, _storage) = setup();
        let mut events = store.subscribe();

        let parcel = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();
        assert_eq!(parcel.status, ParcelStatus::Arrived);
        assert_timestamps(&parcel);

        let parcel = store.verify(parcel.id, verified()).await.unwrap();
        assert_eq!(parcel.status, ParcelStatus::Verified);
        assert_eq!(parcel.notes.as_deref(), Some("box intact"));
        assert_timestamps(&parcel);

        let parcel = store.mark_ready(parcel.id).await.unwrap();
        assert_eq!(parcel.status, ParcelStatus::ReadyForDelivery);
        assert_eq!(backend.package_state("PKG-1"), Some(PackageState::Ready));
        assert_timestamps(&parcel);

        let parcel = store.assign(parcel.id, &driver("D1", true)).await.unwrap();
        assert_eq!(parcel.status, ParcelStatus::Assigned);
        assert_eq!(parcel.assigned_to_driver_id.as_deref(), Some("D1"));
        assert_eq!(parcel.assigned_to_driver_name.as_deref(), Some("Awa Kone"));
        assert_timestamps(&parcel);

        let parcel = store.record_delivered(parcel.id).await.unwrap();
        assert_eq!(parcel.status, ParcelStatus::Delivered);
        assert!(parcel.delivered_at.is_some());
        assert_timestamps(&parcel);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event.to);
        }
        assert_eq!(seen, ParcelStatus::ALL.to_vec());
    }

    #[tokio::test]
    async fn rejected_verification_leaves_parcel_arrived() {
        let (store, _backend, _storage) = setup();
        let parcel = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();

        let err = store
            .verify(parcel.id, Verification { verified: false, notes: None })
            .await
            .unwrap_err();

        assert_eq!(err, DispatchError::VerificationRejected);
        assert_eq!(store.get(parcel.id).await.unwrap().status, ParcelStatus::Arrived);
    }

    #[tokio::test]
    async fn verify_twice_is_an_invalid_state() {
        let (store, _backend, _storage) = setup();
        let parcel = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();
        store.verify(parcel.id, verified()).await.unwrap();

        let err = store.verify(parcel.id, verified()).await.unwrap_err();
        assert_eq!(
            err,
            DispatchError::InvalidState {
                expected: ParcelStatus::Arrived,
                actual: ParcelStatus::Verified,
            }
        );
    }

    #[tokio::test]
    async fn mark_ready_rejects_placeholder_and_blank_codes_in_any_state() {
        let (store, backend, _storage) = setup();

        for code in ["", "code"] {
            let parcel = store
                .create(new_parcel(&format!("ORD-{code}"), code))
                .await
                .unwrap();

            let err = store.mark_ready(parcel.id).await.unwrap_err();
            assert_eq!(err, DispatchError::InvalidTrackingNumber(code.to_string()));

            store.verify(parcel.id, verified()).await.unwrap();
            let err = store.mark_ready(parcel.id).await.unwrap_err();
            assert_eq!(err, DispatchError::InvalidTrackingNumber(code.to_string()));
            assert_eq!(store.get(parcel.id).await.unwrap().status, ParcelStatus::Verified);
        }

        assert_eq!(backend.package_state("code"), None);
    }

    #[tokio::test]
    async fn mark_ready_requires_verification() {
        let (store, _backend, _storage) = setup();
        let parcel = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();

        let err = store.mark_ready(parcel.id).await.unwrap_err();
        assert_eq!(
            err,
            DispatchError::InvalidState {
                expected: ParcelStatus::Verified,
                actual: ParcelStatus::Arrived,
            }
        );
    }

    #[tokio::test]
    async fn upstream_failure_leaves_snapshot_untouched() {
        let (store, backend, storage) = setup();
        let parcel = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();
        store.verify(parcel.id, verified()).await.unwrap();

        let before = store.list().await.unwrap();
        let saved_before = storage.get(KEY);

        backend.set_package_api_failing(true);
        let err = store.mark_ready(parcel.id).await.unwrap_err();
        assert!(matches!(err, DispatchError::Upstream(_)));
        assert_eq!(store.list().await.unwrap(), before);
        assert_eq!(storage.get(KEY), saved_before);

        backend.set_package_api_failing(false);
        store.mark_ready(parcel.id).await.unwrap();

        let before = store.list().await.unwrap();
        backend.set_package_api_failing(true);
        let err = store.assign(parcel.id, &driver("D1", true)).await.unwrap_err();
        assert!(matches!(err, DispatchError::Upstream(_)));
        assert_eq!(store.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn assign_to_unavailable_driver_changes_nothing() {
        let (store, backend, _storage) = setup();
        let parcel = ready_parcel(&store).await;
        let before = store.list().await.unwrap();

        let err = store.assign(parcel.id, &driver("D2", false)).await.unwrap_err();

        assert_eq!(err, DispatchError::DriverUnavailable("D2".to_string()));
        assert_eq!(store.list().await.unwrap(), before);
        assert_eq!(backend.package_state("PKG-1"), Some(PackageState::Ready));
    }

    #[tokio::test]
    async fn assign_requires_ready_for_delivery() {
        let (store, _backend, _storage) = setup();
        let parcel = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();

        let err = store.assign(parcel.id, &driver("D1", true)).await.unwrap_err();
        assert_eq!(err, DispatchError::NotReadyForAssignment(ParcelStatus::Arrived));
    }

    #[tokio::test]
    async fn unknown_parcel_is_reported() {
        let (store, _backend, _storage) = setup();
        let id = uuid::Uuid::new_v4();
        assert_eq!(store.get(id).await.unwrap_err(), DispatchError::ParcelNotFound(id));
        assert_eq!(
            store.record_delivered(id).await.unwrap_err(),
            DispatchError::ParcelNotFound(id)
        );
    }

    #[tokio::test]
    async fn every_mutation_writes_the_whole_collection() {
        let (store, _backend, storage) = setup();
        let first = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();
        store.create(new_parcel("ORD-2", "PKG-2")).await.unwrap();
        store.verify(first.id, verified()).await.unwrap();

        let saved: Vec<Parcel> = serde_json::from_str(&storage.get(KEY).unwrap()).unwrap();
        assert_eq!(saved, store.list().await.unwrap());
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].status, ParcelStatus::Verified);
    }

    #[tokio::test]
    async fn hydrates_from_storage_once() {
        let (seed_store, _backend, storage) = setup();
        let seeded = seed_store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();

        let backend = Arc::new(SimulatedBackend::new(Duration::ZERO));
        let store = ParcelStore::new(storage.clone(), backend, KEY, Metrics::new(), 16);
        assert_eq!(store.get(seeded.id).await.unwrap(), seeded);

        storage.insert(KEY, "[]");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_snapshot_fails_until_repaired() {
        let backend = Arc::new(SimulatedBackend::new(Duration::ZERO));
        let storage = Arc::new(MemoryBlobStorage::new());
        storage.insert(KEY, "{not json");
        let store = ParcelStore::new(storage.clone(), backend, KEY, Metrics::new(), 16);

        assert!(matches!(store.list().await, Err(DispatchError::Storage(_))));

        storage.insert(KEY, "[]");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reintake_refreshes_descriptive_fields_only() {
        let (store, _backend, _storage) = setup();
        let original = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();
        store.verify(original.id, verified()).await.unwrap();

        let mut again = new_parcel("ORD-1", "PKG-OTHER");
        again.receiver_address = "Marcory Zone 4".to_string();
        again.description = None;
        let refreshed = store.create(again).await.unwrap();

        assert_eq!(refreshed.id, original.id);
        assert_eq!(refreshed.tracking_number, "PKG-1");
        assert_eq!(refreshed.status, ParcelStatus::Verified);
        assert_eq!(refreshed.receiver_address, "Marcory Zone 4");
        assert_eq!(refreshed.description, None);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn queries_filter_by_status_and_driver() {
        let (store, _backend, _storage) = setup();
        let parcel = ready_parcel(&store).await;
        store.create(new_parcel("ORD-2", "PKG-2")).await.unwrap();
        store.assign(parcel.id, &driver("D1", true)).await.unwrap();

        assert_eq!(store.list_by_status(ParcelStatus::Arrived).await.unwrap().len(), 1);
        assert_eq!(store.assigned_to("D1").await.unwrap()[0].id, parcel.id);
        assert!(store.assigned_to("D2").await.unwrap().is_empty());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats[&ParcelStatus::Arrived], 1);
        assert_eq!(stats[&ParcelStatus::Assigned], 1);
        assert_eq!(stats[&ParcelStatus::Delivered], 0);
    }

    struct ReadOnlyStorage;

    #[async_trait]
    impl BlobStorage for ReadOnlyStorage {
        async fn load(&self, _key: &str) -> PortResult<Option<String>> {
            Ok(None)
        }

        async fn save(&self, key: &str, _blob: &str) -> PortResult<()> {
            Err(PortError::Storage(format!("{key} is read-only")))
        }
    }

    #[tokio::test]
    async fn failed_save_keeps_committed_transition() {
        let backend = Arc::new(SimulatedBackend::new(Duration::ZERO));
        let store = ParcelStore::new(Arc::new(ReadOnlyStorage), backend, KEY, Metrics::new(), 16);

        let parcel = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();
        let committed = store.verify(parcel.id, verified()).await.unwrap();
        assert_eq!(committed.status, ParcelStatus::Verified);

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, ParcelStatus::Verified);
        assert_eq!(store.get(parcel.id).await.unwrap().status, ParcelStatus::Verified);
    }

    struct GatedPackageApi {
        gate: Barrier,
    }

    #[async_trait]
    impl PackageStatusApi for GatedPackageApi {
        async fn mark_ready(&self, _tracking_number: &str) -> PortResult<()> {
            Ok(())
        }

        async fn assign(&self, _tracking_number: &str, _payload: &AssignmentPayload) -> PortResult<()> {
            self.gate.wait().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_assignments_commit_once() {
        let storage = Arc::new(MemoryBlobStorage::new());
        let api = Arc::new(GatedPackageApi { gate: Barrier::new(2) });
        let store = ParcelStore::new(storage, api, KEY, Metrics::new(), 16);

        let parcel = store.create(new_parcel("ORD-1", "PKG-1")).await.unwrap();
        store.verify(parcel.id, verified()).await.unwrap();
        store.mark_ready(parcel.id).await.unwrap();

        let first = driver("D1", true);
        let second = driver("D2", true);
        let (a, b) = tokio::join!(store.assign(parcel.id, &first), store.assign(parcel.id, &second));

        let results = [a, b];
        let winners: Vec<&Parcel> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(DispatchError::NotReadyForAssignment(ParcelStatus::Assigned))
        )));

        let stored = store.get(parcel.id).await.unwrap();
        assert_eq!(stored.assigned_to_driver_id, winners[0].assigned_to_driver_id);
    }
}
