use crate::host::Host;
use crate::state::{MemoryStat, ProbeError};

const PROC_MEMINFO: &str = "/proc/meminfo";

pub fn collect_memory(host: &dyn Host) -> Result<MemoryStat, ProbeError> {
    let meminfo = host.read_file(PROC_MEMINFO)?;
    parse_meminfo(&meminfo)
}

fn parse_meminfo(meminfo: &str) -> Result<MemoryStat, ProbeError> {
    let total_kb = kb_field(meminfo, "MemTotal")?
        .ok_or_else(|| ProbeError::parse("MemTotal missing from /proc/meminfo"))?;
    let avail_kb = kb_field(meminfo, "MemAvailable")?.unwrap_or(0);

    let total_mb = total_kb / 1024;
    if total_mb == 0 {
        return Err(ProbeError::unavailable("MemTotal is below 1 MB"));
    }
    let used_mb = total_kb.saturating_sub(avail_kb) / 1024;
    let percent = used_mb as f64 / total_mb as f64 * 100.0;

    Ok(MemoryStat {
        total: format!("{total_mb} MB"),
        used: format!("{used_mb} MB"),
        percent: format!("{percent:.1}%"),
        error: None,
    })
}

fn kb_field(meminfo: &str, key: &str) -> Result<Option<u64>, ProbeError> {
    let Some(raw) = meminfo.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name.trim() == key).then_some(value)
    }) else {
        return Ok(None);
    };
    let number = raw.split_whitespace().next().unwrap_or_default();
    number
        .parse::<u64>()
        .map(Some)
        .map_err(|err| ProbeError::parse(format!("bad {key} value {number:?}: {err}")))
}
