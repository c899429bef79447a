use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::models::parcel::ParcelStatus;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub parcel_transitions_total: IntCounterVec,
    pub parcels_by_status: IntGaugeVec,
    pub notifications_total: IntCounterVec,
    pub transition_latency_seconds: HistogramVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let parcel_transitions_total = IntCounterVec::new(
            Opts::new(
                "parcel_transitions_total",
                "Parcel lifecycle transitions by transition and outcome",
            ),
            &["transition", "outcome"],
        )
        .expect("valid parcel_transitions_total metric");

        let parcels_by_status = IntGaugeVec::new(
            Opts::new("parcels_by_status", "Current number of parcels per status"),
            &["status"],
        )
        .expect("valid parcels_by_status metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Post-assignment notifications by channel and outcome"),
            &["channel", "outcome"],
        )
        .expect("valid notifications_total metric");

        let transition_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "transition_latency_seconds",
                "Latency of parcel transitions including upstream calls",
            ),
            &["transition"],
        )
        .expect("valid transition_latency_seconds metric");

        registry
            .register(Box::new(parcel_transitions_total.clone()))
            .expect("register parcel_transitions_total");
        registry
            .register(Box::new(parcels_by_status.clone()))
            .expect("register parcels_by_status");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(transition_latency_seconds.clone()))
            .expect("register transition_latency_seconds");

        Self {
            registry,
            parcel_transitions_total,
            parcels_by_status,
            notifications_total,
            transition_latency_seconds,
        }
    }

    pub fn record_transition(&self, transition: &str, outcome: &str, elapsed_secs: f64) {
        self.parcel_transitions_total
            .with_label_values(&[transition, outcome])
            .inc();
        self.transition_latency_seconds
            .with_label_values(&[transition])
            .observe(elapsed_secs);
    }

    pub fn set_status_counts(&self, counts: &[(ParcelStatus, usize)]) {
        for (status, count) in counts {
            self.parcels_by_status
                .with_label_values(&[status.as_str()])
                .set(*count as i64);
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
