use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::sleep;
use tracing::debug;

use crate::models::driver::{CourierRecord, CourierStatus, Vehicle};
use crate::ports::{
    AssignmentPayload, DirectoryApi, NotificationSink, PackageStatusApi, PortError, PortResult,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PackageState {
    Ready,
    Assigned { driver_id: String, driver_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SentNotification {
    Sms { phone: String, message: String },
    Push { user_id: String, title: String, message: String },
}

/// In-process stand-in for the backend, used when no backend URL is
/// configured and by tests. Every call sleeps for `latency` first.
#[derive(Default)]
pub struct SimulatedBackend {
    latency: Duration,
    couriers: DashMap<String, CourierRecord>,
    packages: DashMap<String, PackageState>,
    sent: Mutex<Vec<SentNotification>>,
    package_api_failing: AtomicBool,
    directory_failing: AtomicBool,
    notifications_failing: AtomicBool,
}

impl SimulatedBackend {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn with_demo_couriers(self) -> Self {
        let demo = [
            ("courier-1", "Awa", "Kone", "+2250700000001", true, true, 4.8, "motorbike"),
            ("courier-2", "Yao", "Kouassi", "+2250700000002", true, true, 4.5, "car"),
            ("courier-3", "Moussa", "Traore", "+2250700000003", false, true, 4.9, "motorbike"),
            ("courier-4", "Affoue", "N'Guessan", "+2250700000004", true, false, 4.1, "bicycle"),
        ];

        for (id, first, last, phone, online, active, rating, vehicle) in demo {
            self.upsert_courier(CourierRecord {
                id: id.to_string(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                phone: phone.to_string(),
                is_online: online,
                is_active: active,
                rating,
                vehicles: vec![Vehicle {
                    vehicle_type: vehicle.to_string(),
                    plate_number: None,
                }],
                current_deliveries_count: 0,
                user_id: None,
            });
        }

        self
    }

    pub fn upsert_courier(&self, record: CourierRecord) {
        self.couriers.insert(record.id.clone(), record);
    }

    pub fn courier(&self, id: &str) -> Option<CourierRecord> {
        self.couriers.get(id).map(|entry| entry.value().clone())
    }

    pub fn package_state(&self, tracking_number: &str) -> Option<PackageState> {
        self.packages
            .get(tracking_number)
            .map(|entry| entry.value().clone())
    }

    pub fn sent_notifications(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn set_package_api_failing(&self, failing: bool) {
        self.package_api_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_directory_failing(&self, failing: bool) {
        self.directory_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_notifications_failing(&self, failing: bool) {
        self.notifications_failing.store(failing, Ordering::SeqCst);
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
    }

    fn record_sent(&self, notification: SentNotification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification);
        }
    }
}

#[async_trait]
impl PackageStatusApi for SimulatedBackend {
    async fn mark_ready(&self, tracking_number: &str) -> PortResult<()> {
        self.delay().await;
        if self.package_api_failing.load(Ordering::SeqCst) {
            return Err(PortError::Upstream("HTTP 503 - package service unavailable".to_string()));
        }

        self.packages
            .insert(tracking_number.to_string(), PackageState::Ready);
        debug!(tracking_number, "simulated package marked ready");
        Ok(())
    }

    async fn assign(&self, tracking_number: &str, payload: &AssignmentPayload) -> PortResult<()> {
        self.delay().await;
        if self.package_api_failing.load(Ordering::SeqCst) {
            return Err(PortError::Upstream("HTTP 503 - package service unavailable".to_string()));
        }

        self.packages.insert(
            tracking_number.to_string(),
            PackageState::Assigned {
                driver_id: payload.driver_id.clone(),
                driver_name: payload.driver_name.clone(),
            },
        );
        debug!(tracking_number, driver_id = %payload.driver_id, "simulated package assigned");
        Ok(())
    }
}

#[async_trait]
impl DirectoryApi for SimulatedBackend {
    async fn list_all(&self) -> PortResult<Vec<CourierRecord>> {
        self.delay().await;
        if self.directory_failing.load(Ordering::SeqCst) {
            return Err(PortError::Upstream("HTTP 500 - directory unavailable".to_string()));
        }

        let mut records: Vec<CourierRecord> = self
            .couriers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn update_status(&self, id: &str, status: CourierStatus) -> PortResult<CourierRecord> {
        self.delay().await;
        if self.directory_failing.load(Ordering::SeqCst) {
            return Err(PortError::Upstream("HTTP 500 - directory unavailable".to_string()));
        }

        let mut record = self
            .couriers
            .get_mut(id)
            .ok_or_else(|| PortError::NotFound(format!("courier {id}")))?;

        match status {
            CourierStatus::Busy => {
                record.current_deliveries_count = record.current_deliveries_count.saturating_add(1);
            }
            CourierStatus::Available => record.is_online = true,
            CourierStatus::Offline => record.is_online = false,
        }

        Ok(record.clone())
    }
}

#[async_trait]
impl NotificationSink for SimulatedBackend {
    async fn send_sms(&self, phone: &str, message: &str) -> PortResult<bool> {
        self.delay().await;
        if self.notifications_failing.load(Ordering::SeqCst) {
            return Err(PortError::Upstream("sms gateway timeout".to_string()));
        }

        self.record_sent(SentNotification::Sms {
            phone: phone.to_string(),
            message: message.to_string(),
        });
        Ok(true)
    }

    async fn send_push(&self, user_id: &str, title: &str, message: &str) -> PortResult<bool> {
        self.delay().await;
        if self.notifications_failing.load(Ordering::SeqCst) {
            return Err(PortError::Upstream("push provider timeout".to_string()));
        }

        self.record_sent(SentNotification::Push {
            user_id: user_id.to_string(),
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(true)
    }
}
