use std::collections::BTreeMap;

/// Engine counters. Snapshots list them in declaration order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Counter {
    ReconcileRuns,
    ReconcileAborted,
    MarkersCreated,
    MarkersRemoved,
    ProviderUpdatesApplied,
    ProviderUpdatesDeferred,
    ModeSwitches,
    SearchesApplied,
    SearchesDiscarded,
}

impl Counter {
    pub fn name(self) -> &'static str {
        match self {
            Counter::ReconcileRuns => "reconcile.runs",
            Counter::ReconcileAborted => "reconcile.aborted",
            Counter::MarkersCreated => "markers.created",
            Counter::MarkersRemoved => "markers.removed",
            Counter::ProviderUpdatesApplied => "provider.applied",
            Counter::ProviderUpdatesDeferred => "provider.deferred",
            Counter::ModeSwitches => "mode.switches",
            Counter::SearchesApplied => "search.applied",
            Counter::SearchesDiscarded => "search.discarded",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Histogram {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl Histogram {
    pub fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: Vec<(&'static str, u64)>,
    pub live_markers: u64,
    pub eligible_per_reconcile: Histogram,
}

/// Reconcile/marker bookkeeping for one controller instance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<Counter, u64>,
    live_markers: u64,
    eligible: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    pub fn inc(&mut self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&mut self, counter: Counter, by: u64) {
        if by == 0 {
            return;
        }
        *self.counters.entry(counter).or_insert(0) += by;
    }

    pub fn live_markers(&self) -> u64 {
        self.live_markers
    }

    pub fn set_live_markers(&mut self, live: u64) {
        self.live_markers = live;
    }

    pub fn record_eligible(&mut self, eligible: u64) {
        self.eligible.record(eligible);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.iter().map(|(k, v)| (k.name(), *v)).collect(),
            live_markers: self.live_markers,
            eligible_per_reconcile: self.eligible,
        }
    }
}
