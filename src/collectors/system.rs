use crate::collectors::stdout_of;
use crate::host::Host;
use crate::state::{ProbeError, SystemStat};
use chrono::{DateTime, Local};
use std::time::Duration;

const HOSTNAME_FILE: &str = "/proc/sys/kernel/hostname";
const OS_RELEASE: &str = "/etc/os-release";
const PROC_UPTIME: &str = "/proc/uptime";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn collect_system_info(
    host: &dyn Host,
    now: DateTime<Local>,
) -> Result<SystemStat, ProbeError> {
    let hostname = match host.hostname() {
        Some(name) => name,
        None => host.read_file(HOSTNAME_FILE)?.trim().to_string(),
    };
    if hostname.is_empty() {
        return Err(ProbeError::unavailable("hostname is empty"));
    }

    let uptime = uptime(host)?;
    let kernel = stdout_of(host, "uname", &["-r"])?.trim().to_string();
    let os = pretty_name(&host.read_file(OS_RELEASE)?);

    Ok(SystemStat {
        hostname,
        uptime,
        kernel,
        os,
        last_update: now.format(TIMESTAMP_FORMAT).to_string(),
        error: None,
    })
}

fn uptime(host: &dyn Host) -> Result<String, ProbeError> {
    if let Ok(out) = stdout_of(host, "uptime", &["-p"]) {
        let out = out.trim();
        if !out.is_empty() {
            return Ok(out.to_string());
        }
    }

    let raw = host.read_file(PROC_UPTIME)?;
    let secs = raw
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| ProbeError::parse(format!("bad /proc/uptime contents {raw:?}")))?;
    Ok(format!(
        "up {}",
        humantime::format_duration(Duration::from_secs(secs as u64))
    ))
}

fn pretty_name(os_release: &str) -> String {
    let value = |key: &str| {
        os_release.lines().find_map(|line| {
            let v = line.strip_prefix(key)?.strip_prefix('=')?;
            let v = v.trim().trim_matches(|c: char| c == '"' || c == '\'');
            (!v.is_empty()).then(|| v.to_string())
        })
    };
    value("PRETTY_NAME")
        .or_else(|| value("NAME"))
        .unwrap_or_else(|| "Linux".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use crate::state::FailureKind;
    use chrono::TimeZone;

    const OS_RELEASE_TEXT: &str = "NAME=\"Ubuntu\"\nVERSION_ID=\"24.04\"\nPRETTY_NAME=\"Ubuntu 24.04.1 LTS\"\nID=ubuntu\n";

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 5, 7).unwrap()
    }

    fn full_host() -> FakeHost {
        FakeHost::new()
            .with_hostname("nas01")
            .with_command("uptime -p", "up 3 days, 4 hours, 12 minutes\n")
            .with_command("uname -r", "6.8.0-45-generic\n")
            .with_file(OS_RELEASE, OS_RELEASE_TEXT)
    }

    #[test]
    fn collects_identity() {
        let stat = collect_system_info(&full_host(), now()).unwrap();
        assert_eq!(stat.hostname, "nas01");
        assert_eq!(stat.uptime, "up 3 days, 4 hours, 12 minutes");
        assert_eq!(stat.kernel, "6.8.0-45-generic");
        assert_eq!(stat.os, "Ubuntu 24.04.1 LTS");
        assert_eq!(stat.last_update, "2026-10-16 09:05:07");
    }

    #[test]
    fn hostname_falls_back_to_procfs() {
        let host = FakeHost::new()
            .with_file(HOSTNAME_FILE, "edge-7\n")
            .with_command("uptime -p", "up 5 minutes\n")
            .with_command("uname -r", "6.1.0\n")
            .with_file(OS_RELEASE, OS_RELEASE_TEXT);
        assert_eq!(collect_system_info(&host, now()).unwrap().hostname, "edge-7");
    }

    #[test]
    fn uptime_falls_back_to_procfs() {
        let host = FakeHost::new()
            .with_hostname("pi")
            .with_failing_command("uptime -p", 1, "", "uptime: invalid option -- 'p'")
            .with_file(PROC_UPTIME, "93784.52 180000.10\n")
            .with_command("uname -r", "6.1.0\n")
            .with_file(OS_RELEASE, "NAME='Alpine Linux'\n");
        let stat = collect_system_info(&host, now()).unwrap();
        assert_eq!(stat.uptime, "up 1day 2h 3m 4s");
        assert_eq!(stat.os, "Alpine Linux");
    }

    #[test]
    fn missing_kernel_query_fails_whole_probe() {
        let host = FakeHost::new()
            .with_hostname("nas01")
            .with_command("uptime -p", "up 1 minute\n")
            .with_file(OS_RELEASE, OS_RELEASE_TEXT);
        let err = collect_system_info(&host, now()).unwrap_err();
        assert_eq!(err.kind, FailureKind::NotInstalled);

        let stat = SystemStat::unavailable(err);
        assert_eq!(stat.hostname, "N/A");
        assert_eq!(stat.last_update, "N/A");
    }
}
