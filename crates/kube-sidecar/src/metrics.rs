//! Validity metric for rendered outputs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Receives the outcome of every syntax check.
pub trait ValiditySink: Send + Sync {
    fn observe(&self, namespace: &str, resource_id: &str, valid: bool);
}

/// Exposes `sidecar_syntax_ok{namespace, config}` through its own registry.
pub struct PrometheusValidity {
    registry: Registry,
    syntax_ok: GaugeVec,
}

impl PrometheusValidity {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let syntax_ok = GaugeVec::new(
            Opts::new("sidecar_syntax_ok", "Sidecar Syntax OK."),
            &["namespace", "config"],
        )?;
        registry.register(Box::new(syntax_ok.clone()))?;

        Ok(Self {
            registry,
            syntax_ok,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl ValiditySink for PrometheusValidity {
    fn observe(&self, namespace: &str, resource_id: &str, valid: bool) {
        self.syntax_ok
            .with_label_values(&[namespace, resource_id])
            .set(if valid { 1.0 } else { 0.0 });
    }
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryValidity {
    values: Mutex<BTreeMap<(String, String), bool>>,
}

impl MemoryValidity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value observed for the pair, if any.
    pub fn get(&self, namespace: &str, resource_id: &str) -> Option<bool> {
        self.values
            .lock()
            .ok()
            .and_then(|values| {
                values
                    .get(&(namespace.to_string(), resource_id.to_string()))
                    .copied()
            })
    }
}

impl ValiditySink for MemoryValidity {
    fn observe(&self, namespace: &str, resource_id: &str, valid: bool) {
        if let Ok(mut values) = self.values.lock() {
            values.insert((namespace.to_string(), resource_id.to_string()), valid);
        }
    }
}
