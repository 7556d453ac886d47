use prometheus::{Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Prometheus metrics for the settlement core.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub payments_verified: IntCounter,
    pub payments_rejected: IntCounter,
    pub feedback_applied: IntCounter,
    pub attestations_applied: IntCounter,
    pub disputes_opened: IntCounter,
    pub disputes_resolved: IntCounter,
    pub slashes_dispatched: IntCounter,
    pub verify_latency: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let payments_verified =
            IntCounter::new("tally_payments_verified_total", "Payments verified and settled")
                .expect("metric definition");
        let payments_rejected =
            IntCounter::new("tally_payments_rejected_total", "Payment claims rejected")
                .expect("metric definition");
        let feedback_applied =
            IntCounter::new("tally_feedback_applied_total", "Feedback events applied")
                .expect("metric definition");
        let attestations_applied = IntCounter::new(
            "tally_attestations_applied_total",
            "Attestation events applied",
        )
        .expect("metric definition");
        let disputes_opened =
            IntCounter::new("tally_disputes_opened_total", "Disputes opened")
                .expect("metric definition");
        let disputes_resolved =
            IntCounter::new("tally_disputes_resolved_total", "Disputes resolved")
                .expect("metric definition");
        let slashes_dispatched =
            IntCounter::new("tally_slashes_dispatched_total", "Slash actions dispatched")
                .expect("metric definition");
        let verify_latency = Histogram::with_opts(HistogramOpts::new(
            "tally_verify_latency_seconds",
            "End-to-end latency of payment verification",
        ))
        .expect("metric definition");

        registry
            .register(Box::new(payments_verified.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(payments_rejected.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(feedback_applied.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(attestations_applied.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(disputes_opened.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(disputes_resolved.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(slashes_dispatched.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(verify_latency.clone()))
            .expect("metric registration");

        Self {
            registry,
            payments_verified,
            payments_rejected,
            feedback_applied,
            attestations_applied,
            disputes_opened,
            disputes_resolved,
            slashes_dispatched,
            verify_latency,
        }
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder.encode_to_string(&families).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_gather() {
        let metrics = Metrics::new();
        metrics.payments_verified.inc();
        let output = metrics.gather();
        assert!(output.contains("tally_payments_verified_total"));
    }
}
