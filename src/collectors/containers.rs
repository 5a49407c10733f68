use crate::collectors::stdout_of;
use crate::host::Host;
use crate::state::{ContainerStat, ProbeError};

const DOCKER: &str = "docker";

/// `Ok(None)` means docker is not installed.
pub fn collect_containers(host: &dyn Host) -> Result<Option<Vec<ContainerStat>>, ProbeError> {
    if !host.has_program(DOCKER) {
        return Ok(None);
    }
    let out = stdout_of(
        host,
        DOCKER,
        &["ps", "-a", "--format", "{{.Names}}|{{.Image}}|{{.Status}}"],
    )?;
    Ok(Some(parse_containers(&out)))
}

fn parse_containers(out: &str) -> Vec<ContainerStat> {
    out.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            let [name, image, status] = parts.as_slice() else {
                return None;
            };
            Some(ContainerStat {
                name: name.to_string(),
                image: image.to_string(),
                status: status.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use crate::state::FailureKind;

    const PS_ARGV: &str = "docker ps -a --format {{.Names}}|{{.Image}}|{{.Status}}";

    #[test]
    fn not_installed_is_none() {
        assert_eq!(collect_containers(&FakeHost::new()).unwrap(), None);
    }

    #[test]
    fn lists_running_and_stopped() {
        let ps = "\
web|nginx:1.27|Up 3 hours
db|postgres:16|Exited (0) 2 days ago
broken line
";
        let host = FakeHost::new().with_program("docker").with_command(PS_ARGV, ps);
        let containers = collect_containers(&host).unwrap().unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "web");
        assert_eq!(containers[0].image, "nginx:1.27");
        assert_eq!(containers[1].status, "Exited (0) 2 days ago");
    }

    #[test]
    fn zero_containers_is_an_empty_list() {
        let host = FakeHost::new().with_program("docker").with_command(PS_ARGV, "");
        assert_eq!(collect_containers(&host).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn daemon_down_is_an_error() {
        let host = FakeHost::new().with_program("docker").with_failing_command(
            PS_ARGV,
            1,
            "",
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock.",
        );
        let err = collect_containers(&host).unwrap_err();
        assert_eq!(err.kind, FailureKind::Command);
    }
}
