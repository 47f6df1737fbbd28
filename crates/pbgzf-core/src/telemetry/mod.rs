use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod profile;
pub mod tags;
pub mod worker;

/// Label pairs attached to one metric update, e.g. `[("queue", "input")]`.
pub type Labels<'a> = [(&'a str, &'a str)];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub total: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

impl HistogramSnapshot {
    fn merge(self, other: Self) -> Self {
        if self.count == 0 {
            return other;
        }
        if other.count == 0 {
            return self;
        }
        let count = self.count.saturating_add(other.count);
        let total = self.total.saturating_add(other.total);
        Self {
            count,
            total,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            mean: total as f64 / count as f64,
        }
    }
}

/// Every metric series recorded since the last [`reset`].
///
/// Keys are series keys as built by [`series_key`]: the metric name, then
/// the sorted label pairs in braces (`pbgzf.queue.depth{queue=input,subsystem=queue}`).
/// The plain lookups ([`counter`](Self::counter) and friends) fold every
/// series of one metric together. The `_with` lookups select one series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, HistogramSnapshot>,
}

impl TelemetrySnapshot {
    /// Sum of every series of counter `name`.
    pub fn counter(&self, name: &str) -> Option<u64> {
        fold_series(&self.counters, name, |total, value| total.saturating_add(value))
    }

    /// Sum of every series of gauge `name`.
    pub fn gauge(&self, name: &str) -> Option<u64> {
        fold_series(&self.gauges, name, |total, value| total.saturating_add(value))
    }

    /// Every series of histogram `name` merged into one summary.
    pub fn histogram(&self, name: &str) -> Option<HistogramSnapshot> {
        fold_series(&self.histograms, name, HistogramSnapshot::merge)
    }

    pub fn counter_with(&self, name: &str, labels: &Labels<'_>) -> Option<u64> {
        self.counters.get(&series_key(name, labels)).copied()
    }

    pub fn gauge_with(&self, name: &str, labels: &Labels<'_>) -> Option<u64> {
        self.gauges.get(&series_key(name, labels)).copied()
    }

    pub fn histogram_with(&self, name: &str, labels: &Labels<'_>) -> Option<HistogramSnapshot> {
        self.histograms.get(&series_key(name, labels)).copied()
    }
}

fn fold_series<V: Copy>(
    series: &BTreeMap<String, V>,
    name: &str,
    fold: impl Fn(V, V) -> V,
) -> Option<V> {
    series
        .iter()
        .filter(|(key, _)| metric_name(key) == name)
        .map(|(_, value)| *value)
        .reduce(fold)
}

/// Builds the registry key for one metric series. Label order does not matter.
pub fn series_key(name: &str, labels: &Labels<'_>) -> String {
    if labels.is_empty() {
        return name.to_owned();
    }
    let mut sorted = labels.to_vec();
    sorted.sort_unstable();

    let mut key = String::with_capacity(name.len() + 2 + labels.len() * 16);
    key.push_str(name);
    key.push('{');
    for (index, (label, value)) in sorted.into_iter().enumerate() {
        if index > 0 {
            key.push(',');
        }
        key.push_str(label);
        key.push('=');
        key.push_str(value);
    }
    key.push('}');
    key
}

fn metric_name(key: &str) -> &str {
    key.split_once('{').map_or(key, |(name, _)| name)
}

#[inline]
pub fn increment_counter(name: &'static str, value: u64, labels: &Labels<'_>) {
    #[cfg(feature = "telemetry")]
    registry::update_counter(series_key(name, labels), |total| total.saturating_add(value));

    #[cfg(not(feature = "telemetry"))]
    let _ = (name, value, labels);
}

#[inline]
pub fn record_histogram(name: &'static str, value: u64, labels: &Labels<'_>) {
    #[cfg(feature = "telemetry")]
    registry::record_histogram(series_key(name, labels), value);

    #[cfg(not(feature = "telemetry"))]
    let _ = (name, value, labels);
}

/// Gauges are one series per label set, so every update of a gauge must
/// pass the same labels.
#[inline]
pub fn set_gauge(name: &'static str, value: u64, labels: &Labels<'_>) {
    #[cfg(feature = "telemetry")]
    registry::update_gauge(series_key(name, labels), |_| value);

    #[cfg(not(feature = "telemetry"))]
    let _ = (name, value, labels);
}

#[inline]
pub fn add_gauge(name: &'static str, delta: u64, labels: &Labels<'_>) {
    #[cfg(feature = "telemetry")]
    registry::update_gauge(series_key(name, labels), |current| current.saturating_add(delta));

    #[cfg(not(feature = "telemetry"))]
    let _ = (name, delta, labels);
}

/// Subtracts `delta` from a gauge, stopping at zero.
#[inline]
pub fn sub_gauge_saturating(name: &'static str, delta: u64, labels: &Labels<'_>) {
    #[cfg(feature = "telemetry")]
    registry::update_gauge(series_key(name, labels), |current| current.saturating_sub(delta));

    #[cfg(not(feature = "telemetry"))]
    let _ = (name, delta, labels);
}

/// Copies the registry. Empty unless the `telemetry` feature is enabled.
pub fn snapshot() -> TelemetrySnapshot {
    #[cfg(feature = "telemetry")]
    {
        registry::snapshot()
    }

    #[cfg(not(feature = "telemetry"))]
    {
        TelemetrySnapshot::default()
    }
}

pub fn reset() {
    #[cfg(feature = "telemetry")]
    registry::reset();
}

#[cfg(feature = "telemetry")]
mod registry {
    use std::collections::BTreeMap;
    use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

    use super::{HistogramSnapshot, TelemetrySnapshot};

    // One lock for all three maps keeps a snapshot consistent across kinds.
    #[derive(Default)]
    struct Series {
        counters: BTreeMap<String, u64>,
        gauges: BTreeMap<String, u64>,
        histograms: BTreeMap<String, HistogramSnapshot>,
    }

    fn series() -> MutexGuard<'static, Series> {
        static SERIES: OnceLock<Mutex<Series>> = OnceLock::new();
        SERIES
            .get_or_init(Mutex::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn update_counter(key: String, update: impl FnOnce(u64) -> u64) {
        let mut series = series();
        let entry = series.counters.entry(key).or_insert(0);
        *entry = update(*entry);
    }

    pub(super) fn update_gauge(key: String, update: impl FnOnce(u64) -> u64) {
        let mut series = series();
        let entry = series.gauges.entry(key).or_insert(0);
        *entry = update(*entry);
    }

    pub(super) fn record_histogram(key: String, value: u64) {
        let single = HistogramSnapshot {
            count: 1,
            total: value,
            min: value,
            max: value,
            mean: value as f64,
        };
        let mut series = series();
        let entry = series.histograms.entry(key).or_default();
        *entry = entry.merge(single);
    }

    pub(super) fn snapshot() -> TelemetrySnapshot {
        let series = series();
        TelemetrySnapshot {
            counters: series.counters.clone(),
            gauges: series.gauges.clone(),
            histograms: series.histograms.clone(),
        }
    }

    pub(super) fn reset() {
        *series() = Series::default();
    }
}
