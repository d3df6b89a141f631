// Metric primitives shared by every collector, and the sink interface they are published through.

mod meter;
mod registry;

pub use meter::{Meter, MeterSnapshot};
pub use registry::Registry;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A sampled gauge value. Counters from the kernel are integral, averages are not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GaugeValue {
    Integer(u64),
    Float(f64),
}

impl GaugeValue {
    pub fn as_f64(self) -> f64 {
        match self {
            GaugeValue::Integer(v) => v as f64,
            GaugeValue::Float(v) => v,
        }
    }
}

impl From<u64> for GaugeValue {
    fn from(v: u64) -> Self {
        GaugeValue::Integer(v)
    }
}

impl From<f64> for GaugeValue {
    fn from(v: f64) -> Self {
        GaugeValue::Float(v)
    }
}

/// A read-only metric computed on demand from whatever its owner last sampled.
#[derive(Clone)]
pub struct Gauge(Arc<dyn Fn() -> GaugeValue + Send + Sync>);

impl Gauge {
    pub fn new<F, V>(read: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue>,
    {
        Gauge(Arc::new(move || read().into()))
    }

    pub fn value(&self) -> GaugeValue {
        (self.0)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Gauge").field(&self.value()).finish()
    }
}

/// A handle to one exposed metric. Cloning shares the underlying metric.
#[derive(Debug, Clone)]
pub enum Metric {
    Gauge(Gauge),
    Meter(Arc<Meter>),
}

impl Metric {
    pub fn snapshot(&self) -> MetricSnapshot {
        match self {
            Metric::Gauge(g) => MetricSnapshot::Gauge { value: g.value() },
            Metric::Meter(m) => MetricSnapshot::Meter(m.snapshot()),
        }
    }

    pub fn as_gauge(&self) -> Option<&Gauge> {
        match self {
            Metric::Gauge(g) => Some(g),
            Metric::Meter(_) => None,
        }
    }

    pub fn as_meter(&self) -> Option<&Arc<Meter>> {
        match self {
            Metric::Meter(m) => Some(m),
            Metric::Gauge(_) => None,
        }
    }
}

impl From<Gauge> for Metric {
    fn from(g: Gauge) -> Self {
        Metric::Gauge(g)
    }
}

impl From<Arc<Meter>> for Metric {
    fn from(m: Arc<Meter>) -> Self {
        Metric::Meter(m)
    }
}

/// Point-in-time view of a metric, as served to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricSnapshot {
    Gauge { value: GaugeValue },
    Meter(MeterSnapshot),
}

/// Named metrics exposed by one collector bundle (an interface, a device, ...).
pub type MetricBundle = BTreeMap<String, Metric>;

/// Anything exposing a fixed set of named metrics.
pub trait MetricSet: Send + Sync {
    fn metrics(&self) -> MetricBundle;
}

/// The external registry metrics are published into.
pub trait MetricSink {
    fn register(&self, name: &str, metric: Metric);
}
