use crate::host::Host;
use crate::state::OrderedMap;
use tracing::debug;

const INACTIVE: &str = "inactive";
const UNKNOWN: &str = "unknown";

pub fn collect_services(host: &dyn Host, services: &[String]) -> OrderedMap<String> {
    services
        .iter()
        .map(|name| (name.clone(), service_status(host, name)))
        .collect()
}

fn service_status(host: &dyn Host, name: &str) -> String {
    match host.run("systemctl", &["is-active", name]) {
        Ok(out) if out.success => out.stdout.trim().to_string(),
        Ok(out) => [out.stdout.trim(), out.stderr.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or(INACTIVE)
            .to_string(),
        Err(err) => {
            debug!(service = name, error = %err, "service status query failed");
            UNKNOWN.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn one_failure_does_not_hide_the_others() {
        let host = FakeHost::new()
            .with_command("systemctl is-active docker", "active\n")
            .with_failing_command("systemctl is-active libvirtd", 3, "inactive\n", "")
            .with_failing_command("systemctl is-active nginx", 3, "failed\n", "")
            .with_failing_command("systemctl is-active ghost", 4, "", "")
            .with_timeout("systemctl is-active smbd");

        let statuses = collect_services(
            &host,
            &names(&["docker", "libvirtd", "smbd", "nginx", "ghost"]),
        );

        let got: Vec<(&str, &str)> = statuses.iter().map(|(k, v)| (k, v.as_str())).collect();
        assert_eq!(
            got,
            vec![
                ("docker", "active"),
                ("libvirtd", "inactive"),
                ("smbd", "unknown"),
                ("nginx", "failed"),
                ("ghost", "inactive"),
            ]
        );
    }

    #[test]
    fn stderr_is_used_when_stdout_is_empty() {
        let host = FakeHost::new().with_failing_command(
            "systemctl is-active docker",
            1,
            "",
            "System has not been booted with systemd\n",
        );
        let statuses = collect_services(&host, &names(&["docker"]));
        assert_eq!(
            statuses.get("docker").map(String::as_str),
            Some("System has not been booted with systemd")
        );
    }

    #[test]
    fn missing_systemctl_reports_unknown() {
        let statuses = collect_services(&FakeHost::new(), &names(&["docker"]));
        assert_eq!(statuses.get("docker").map(String::as_str), Some("unknown"));
    }
}
