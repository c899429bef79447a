use std::sync::Arc;

use crate::error::DispatchError;
use crate::models::order::Order;
use crate::models::parcel::{NewParcel, Parcel};
use crate::store::ParcelStore;

/// Turns incoming orders into parcels at this station.
///
/// Intake accepts whatever the order carries: an order without package codes
/// still yields a parcel, tracked under its order number. Tracking numbers are
/// only validated when the parcel is marked ready.
#[derive(Clone)]
pub struct OrderIntakeAdapter {
    store: Arc<ParcelStore>,
    station_id: String,
    station_name: String,
}

impl OrderIntakeAdapter {
    pub fn new(store: Arc<ParcelStore>, station_id: impl Into<String>, station_name: impl Into<String>) -> Self {
        Self {
            store,
            station_id: station_id.into(),
            station_name: station_name.into(),
        }
    }

    pub async fn create_from_order(&self, order: &Order) -> Result<Parcel, DispatchError> {
        self.store.create(self.new_parcel(order)).await
    }

    fn new_parcel(&self, order: &Order) -> NewParcel {
        let tracking_number = order
            .package_codes
            .first()
            .filter(|code| !code.is_empty())
            .cloned()
            .unwrap_or_else(|| order.order_number.clone());

        NewParcel {
            tracking_number,
            order_number: order.order_number.clone(),
            sender_name: order.sender_name.clone(),
            sender_phone: order.sender_phone.clone(),
            receiver_name: order.receiver_name.clone(),
            receiver_phone: order.receiver_phone.clone(),
            receiver_address: order.delivery_address.clone(),
            description: order.description.clone(),
            station_id: self.station_id.clone(),
            station_name: self.station_name.clone(),
            order_date: order.order_date,
        }
    }
}
