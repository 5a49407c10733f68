pub mod containers;
pub mod cpu;
pub mod disk;
pub mod firewall;
pub mod memory;
pub mod services;
pub mod sessions;
pub mod system;

use crate::host::Host;
use crate::metrics::Metrics;
use crate::state::{
    CpuStat, DiskStat, FirewallStat, MemoryStat, OrderedMap, ProbeError, Snapshot, SystemStat,
};
use chrono::Local;
use cpu::CpuProbe;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) fn stdout_of(
    host: &dyn Host,
    program: &str,
    args: &[&str],
) -> Result<String, ProbeError> {
    let out = host.run(program, args)?;
    if !out.success {
        let code = out
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(ProbeError::command(format!(
            "{program} exited with {code}: {}",
            out.stderr.trim()
        )));
    }
    Ok(out.stdout)
}

/// Holds the CPU counter state between calls; drive it from one cycle at a time.
pub struct Sampler {
    host: Arc<dyn Host>,
    cpu: CpuProbe,
    services: Vec<String>,
    metrics: Option<Arc<Metrics>>,
}

impl Sampler {
    pub fn new(host: Arc<dyn Host>, services: Vec<String>) -> Self {
        Self {
            host,
            cpu: CpuProbe::new(),
            services,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn collect(&mut self) -> Snapshot {
        let host = self.host.as_ref();
        let metrics = self.metrics.as_deref();
        let cpu_probe = &mut self.cpu;
        let service_names = &self.services;

        let cpu = guarded(metrics, "cpu", || cpu_probe.sample(host), CpuStat::unavailable);
        let memory = guarded(
            metrics,
            "memory",
            || memory::collect_memory(host),
            MemoryStat::unavailable,
        );
        let disk = guarded(
            metrics,
            "disk",
            || disk::collect_disk(host),
            DiskStat::unavailable,
        );
        let mounts = guarded(metrics, "mounts", || disk::collect_mounts(host), |_| Vec::new());
        let users = guarded(
            metrics,
            "users",
            || sessions::collect_users(host),
            |_| Vec::new(),
        );
        let services = guarded(
            metrics,
            "services",
            || Ok(services::collect_services(host, service_names)),
            |_| {
                service_names
                    .iter()
                    .map(|name| (name.clone(), "unknown".to_string()))
                    .collect::<OrderedMap<String>>()
            },
        );
        let docker_containers = guarded(
            metrics,
            "docker_containers",
            || containers::collect_containers(host),
            |_| Some(Vec::new()),
        );
        let system = guarded(
            metrics,
            "system",
            || system::collect_system_info(host, Local::now()),
            SystemStat::unavailable,
        );
        let ufw = guarded(
            metrics,
            "ufw",
            || firewall::collect_firewall(host),
            FirewallStat::unavailable,
        );

        debug!(
            cpu = %cpu.usage,
            memory = %memory.percent,
            mounts = mounts.len(),
            users = users.len(),
            services = services.len(),
            firewall_active = ufw.active,
            blocked_ports = ufw.ports.len(),
            "snapshot collected"
        );

        Snapshot {
            cpu,
            memory,
            disk,
            mounts,
            users,
            services,
            docker_containers,
            system,
            ufw,
        }
    }
}

fn guarded<T>(
    metrics: Option<&Metrics>,
    probe: &'static str,
    run: impl FnOnce() -> Result<T, ProbeError>,
    fallback: impl FnOnce(ProbeError) -> T,
) -> T {
    let err = match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(value)) => return value,
        Ok(Err(err)) => err,
        Err(payload) => ProbeError::panicked(panic_message(payload.as_ref())),
    };
    warn!(probe, kind = %err.kind, error = %err, "probe failed");
    if let Some(metrics) = metrics {
        metrics.inc_probe_failure(probe);
    }
    fallback(err)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "probe panicked".to_string())
}

#[cfg(test)]
pub(crate) fn healthy_host() -> crate::host::fake::FakeHost {
    crate::host::fake::FakeHost::new()
        .with_file("/proc/stat", "cpu  100 0 50 800 50 0 0 0 0 0\n")
        .with_file("/proc/cpuinfo", "model name\t: AMD Ryzen 7 5800X 8-Core Processor\n")
        .with_command("nproc", "16\n")
        .with_file(
            "/proc/meminfo",
            "MemTotal: 8388608 kB\nMemAvailable: 4194304 kB\n",
        )
        .with_command(
            "df -hP /",
            "Filesystem Size Used Avail Use% Mounted on\n/dev/sda2 100G 40G 60G 40% /\n",
        )
        .with_command(
            "df -h --output=source,size,used,avail,pcent,target -x tmpfs -x devtmpfs -x overlay",
            "Filesystem Size Used Avail Use% Mounted on\n/dev/sda2 100G 40G 60G 40% /\n",
        )
        .with_command("who", "admin pts/0 2026-10-16 08:00\n")
        .with_command("systemctl is-active docker", "active\n")
        .with_program("docker")
        .with_command(
            "docker ps -a --format {{.Names}}|{{.Image}}|{{.Status}}",
            "web|nginx|Up 2 hours\n",
        )
        .with_hostname("nas01")
        .with_command("uptime -p", "up 2 hours\n")
        .with_command("uname -r", "6.8.0\n")
        .with_file("/etc/os-release", "PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n")
        .with_command("ufw status", "Status: active\n")
        .with_command(
            "dmesg",
            "[1.0] [UFW BLOCK] IN=eth0 SRC=1.2.3.4 DST=10.0.0.2 PROTO=TCP DPT=22\n",
        )
}
