use crate::state::Snapshot;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started_at_unix: i64,
    pub hostdash_cycles_total: Counter,
    pub hostdash_cycle_errors_total: CounterVec,
    pub hostdash_probe_failures_total: CounterVec,
    pub hostdash_cycle_duration_seconds: Gauge,
    pub hostdash_last_publish_timestamp_seconds: Gauge,
    pub hostdash_cpu_usage_percent: Gauge,
    pub hostdash_memory_usage_percent: Gauge,
    pub hostdash_firewall_blocked_events: Gauge,
    pub hostdash_uptime_seconds: Gauge,
    pub hostdash_scrape_count_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let hostdash_cycles_total = Counter::with_opts(opts!(
            "hostdash_cycles_total",
            "Snapshot cycles that were collected and published"
        ))?;
        let hostdash_cycle_errors_total = CounterVec::new(
            opts!(
                "hostdash_cycle_errors_total",
                "Cycles abandoned because of an error, by stage"
            ),
            &["stage"],
        )?;
        let hostdash_probe_failures_total = CounterVec::new(
            opts!(
                "hostdash_probe_failures_total",
                "Probe runs that fell back to placeholder values, by probe"
            ),
            &["probe"],
        )?;
        let hostdash_cycle_duration_seconds = Gauge::with_opts(opts!(
            "hostdash_cycle_duration_seconds",
            "Wall time of the last collect and publish"
        ))?;
        let hostdash_last_publish_timestamp_seconds = Gauge::with_opts(opts!(
            "hostdash_last_publish_timestamp_seconds",
            "Unix time of the last successful publish"
        ))?;
        let hostdash_cpu_usage_percent = Gauge::with_opts(opts!(
            "hostdash_cpu_usage_percent",
            "CPU usage from the last snapshot in percent (0..100)"
        ))?;
        let hostdash_memory_usage_percent = Gauge::with_opts(opts!(
            "hostdash_memory_usage_percent",
            "Memory usage from the last snapshot in percent (0..100)"
        ))?;
        let hostdash_firewall_blocked_events = Gauge::with_opts(opts!(
            "hostdash_firewall_blocked_events",
            "Blocked packets on the top ports in the scanned kernel log window"
        ))?;
        let hostdash_uptime_seconds = Gauge::with_opts(opts!(
            "hostdash_uptime_seconds",
            "Seconds since the collector started"
        ))?;
        let hostdash_scrape_count_total = Counter::with_opts(opts!(
            "hostdash_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;

        register(&registry, &hostdash_cycles_total)?;
        register(&registry, &hostdash_cycle_errors_total)?;
        register(&registry, &hostdash_probe_failures_total)?;
        register(&registry, &hostdash_cycle_duration_seconds)?;
        register(&registry, &hostdash_last_publish_timestamp_seconds)?;
        register(&registry, &hostdash_cpu_usage_percent)?;
        register(&registry, &hostdash_memory_usage_percent)?;
        register(&registry, &hostdash_firewall_blocked_events)?;
        register(&registry, &hostdash_uptime_seconds)?;
        register(&registry, &hostdash_scrape_count_total)?;

        Ok(Arc::new(Self {
            registry,
            started_at_unix: now_unix(),
            hostdash_cycles_total,
            hostdash_cycle_errors_total,
            hostdash_probe_failures_total,
            hostdash_cycle_duration_seconds,
            hostdash_last_publish_timestamp_seconds,
            hostdash_cpu_usage_percent,
            hostdash_memory_usage_percent,
            hostdash_firewall_blocked_events,
            hostdash_uptime_seconds,
            hostdash_scrape_count_total,
        }))
    }

    pub fn record_publish(&self, snapshot: &Snapshot, duration_secs: f64) {
        self.hostdash_cycles_total.inc();
        self.hostdash_cycle_duration_seconds.set(duration_secs);
        self.hostdash_last_publish_timestamp_seconds
            .set(now_unix() as f64);

        if let Some(v) = parse_percent(&snapshot.cpu.usage) {
            self.hostdash_cpu_usage_percent.set(v);
        }
        if snapshot.memory.error.is_none() {
            if let Some(v) = parse_percent(&snapshot.memory.percent) {
                self.hostdash_memory_usage_percent.set(v);
            }
        }
        self.hostdash_firewall_blocked_events
            .set(snapshot.ufw.blocked_events() as f64);
    }

    pub fn inc_cycle_error(&self, stage: &str) {
        self.hostdash_cycle_errors_total
            .with_label_values(&[stage])
            .inc();
    }

    pub fn inc_probe_failure(&self, probe: &str) {
        self.hostdash_probe_failures_total.with_label_values(&[probe]).inc();
    }

    pub fn inc_scrape_count(&self) {
        self.hostdash_scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        self.hostdash_uptime_seconds
            .set(now_unix().saturating_sub(self.started_at_unix) as f64);
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn parse_percent(value: &str) -> Option<f64> {
    value.strip_suffix('%')?.trim().parse::<f64>().ok()
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
