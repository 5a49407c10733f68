use crate::collectors::stdout_of;
use crate::host::Host;
use crate::state::{CpuStat, ProbeError};

const PROC_STAT: &str = "/proc/stat";
const PROC_CPUINFO: &str = "/proc/cpuinfo";

/// Cumulative jiffies from the aggregate `cpu` line, iowait folded into idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

#[derive(Debug, Default)]
pub struct CpuProbe {
    prev: Option<CpuTimes>,
}

impl CpuProbe {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_previous(prev: CpuTimes) -> Self {
        Self { prev: Some(prev) }
    }

    #[cfg(test)]
    pub fn previous(&self) -> Option<CpuTimes> {
        self.prev
    }

    pub fn sample(&mut self, host: &dyn Host) -> Result<CpuStat, ProbeError> {
        let stat = host.read_file(PROC_STAT)?;
        let now = parse_cpu_times(&stat)?;
        let usage = usage_percent(self.prev, now);
        // seeds the next delta even if the lookups below fail
        self.prev = Some(now);

        let cpuinfo = host.read_file(PROC_CPUINFO)?;
        let model = parse_model(&cpuinfo);
        let cores = stdout_of(host, "nproc", &[])?;
        let cores = cores.trim();
        cores
            .parse::<u32>()
            .map_err(|err| ProbeError::parse(format!("nproc returned {cores:?}: {err}")))?;

        Ok(CpuStat {
            usage: format!("{usage:.1}%"),
            model,
            cores: cores.to_string(),
            error: None,
        })
    }
}

pub fn parse_cpu_times(stat: &str) -> Result<CpuTimes, ProbeError> {
    let line = stat.lines().next().unwrap_or_default();
    let Some(rest) = line.strip_prefix("cpu ") else {
        return Err(ProbeError::parse("missing aggregate cpu line in /proc/stat"));
    };

    let fields = rest
        .split_whitespace()
        .take(8)
        .map(|v| {
            v.parse::<u64>()
                .map_err(|err| ProbeError::parse(format!("bad /proc/stat counter {v:?}: {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if fields.len() < 4 {
        return Err(ProbeError::parse(format!(
            "expected at least 4 cpu counters, got {}",
            fields.len()
        )));
    }

    let field = |i: usize| fields.get(i).copied().unwrap_or(0);
    let (user, nice, system, idle) = (field(0), field(1), field(2), field(3));
    let (iowait, irq, softirq, steal) = (field(4), field(5), field(6), field(7));

    let idle = idle.saturating_add(iowait);
    let busy = [user, nice, system, irq, softirq, steal]
        .iter()
        .fold(0_u64, |acc, v| acc.saturating_add(*v));
    Ok(CpuTimes {
        total: idle.saturating_add(busy),
        idle,
    })
}

pub fn usage_percent(prev: Option<CpuTimes>, now: CpuTimes) -> f64 {
    let Some(prev) = prev else {
        return 0.0;
    };
    let total_delta = now.total as f64 - prev.total as f64;
    if total_delta <= 0.0 {
        return 0.0;
    }
    let idle_delta = now.idle as f64 - prev.idle as f64;
    ((total_delta - idle_delta) / total_delta * 100.0).clamp(0.0, 100.0)
}

fn parse_model(cpuinfo: &str) -> String {
    ["model name", "Processor", "Hardware"]
        .iter()
        .find_map(|key| field_value(cpuinfo, key))
        .unwrap_or_else(|| "Unknown".to_string())
}

fn field_value(text: &str, key: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim() != key {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}
