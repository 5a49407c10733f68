use crate::collectors::stdout_of;
use crate::host::Host;
use crate::state::{DiskStat, MountStat, ProbeError};
use tracing::debug;

const MOUNT_ARGS: [&str; 8] = [
    "-h",
    "--output=source,size,used,avail,pcent,target",
    "-x",
    "tmpfs",
    "-x",
    "devtmpfs",
    "-x",
    "overlay",
];

pub fn collect_disk(host: &dyn Host) -> Result<DiskStat, ProbeError> {
    let out = stdout_of(host, "df", &["-hP", "/"])?;
    let line = out
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| ProbeError::parse("df printed nothing for /"))?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return Err(ProbeError::parse(format!("unexpected df row: {line:?}")));
    }
    Ok(DiskStat {
        total: parts[1].to_string(),
        used: parts[2].to_string(),
        free: parts[3].to_string(),
        percent: parts[4].to_string(),
        error: None,
    })
}

pub fn collect_mounts(host: &dyn Host) -> Result<Vec<MountStat>, ProbeError> {
    let out = host.run("df", &MOUNT_ARGS)?;
    if !out.success {
        // df exits 1 when a single mount is unreadable but still lists the rest
        debug!(code = ?out.code, stderr = out.stderr.trim(), "df reported errors");
    }
    if out.stdout.trim().is_empty() {
        return Err(ProbeError::command(format!(
            "df printed no mounts: {}",
            out.stderr.trim()
        )));
    }
    Ok(parse_mounts(&out.stdout))
}

fn parse_mounts(out: &str) -> Vec<MountStat> {
    out.lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 6 {
                return None;
            }
            Some(MountStat {
                source: parts[0].to_string(),
                size: parts[1].to_string(),
                used: parts[2].to_string(),
                avail: parts[3].to_string(),
                percent: parts[4].to_string(),
                target: parts[5..].join(" "),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;
    use crate::state::FailureKind;

    const DF_ROOT: &str = "Filesystem      Size  Used Avail Use% Mounted on\n/dev/nvme0n1p2  468G  120G  325G  27% /\n";

    const DF_MOUNTS: &str = "\
Filesystem      Size  Used Avail Use% Mounted on
/dev/nvme0n1p2  468G  120G  325G  27% /
/dev/nvme0n1p1  511M  6.1M  505M   2% /boot/efi
/dev/sdb1       3.6T  2.1T  1.4T  61% /mnt/media library
";

    #[test]
    fn root_usage_from_df() {
        let host = FakeHost::new().with_command("df -hP /", DF_ROOT);
        let stat = collect_disk(&host).unwrap();
        assert_eq!(stat.total, "468G");
        assert_eq!(stat.used, "120G");
        assert_eq!(stat.free, "325G");
        assert_eq!(stat.percent, "27%");
    }

    #[test]
    fn df_failure_is_reported() {
        let host =
            FakeHost::new().with_failing_command("df -hP /", 1, "", "df: /: Permission denied");
        let err = collect_disk(&host).unwrap_err();
        assert_eq!(err.kind, FailureKind::Command);
        assert!(err.message.contains("Permission denied"));

        let stat = DiskStat::unavailable(err);
        assert_eq!(stat.free, "N/A");
        assert_eq!(stat.percent, "0%");
    }

    #[test]
    fn short_row_is_a_parse_error() {
        let host = FakeHost::new().with_command("df -hP /", "Filesystem\n/dev/sda1 1G\n");
        assert_eq!(collect_disk(&host).unwrap_err().kind, FailureKind::Parse);
    }

    #[test]
    fn mounts_skip_header_and_keep_spaces_in_target() {
        let argv = format!("df {}", MOUNT_ARGS.join(" "));
        let host = FakeHost::new().with_command(&argv, DF_MOUNTS);
        let mounts = collect_mounts(&host).unwrap();
        assert_eq!(mounts.len(), 3);
        assert_eq!(mounts[0].source, "/dev/nvme0n1p2");
        assert_eq!(mounts[1].target, "/boot/efi");
        assert_eq!(mounts[1].percent, "2%");
        assert_eq!(mounts[2].target, "/mnt/media library");
    }

    #[test]
    fn mounts_survive_one_unreadable_filesystem() {
        let argv = format!("df {}", MOUNT_ARGS.join(" "));
        let rows = "\
Filesystem      Size  Used Avail Use% Mounted on
/dev/nvme0n1p2  468G  120G  325G  27% /
/dev/nvme0n1p1  511M  6.1M  505M   2% /boot/efi
";
        let host = FakeHost::new().with_failing_command(
            &argv,
            1,
            rows,
            "df: /run/user/1000/doc: Operation not permitted\n",
        );
        let mounts = collect_mounts(&host).unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[1].target, "/boot/efi");
    }

    #[test]
    fn failing_df_without_rows_is_an_error() {
        let argv = format!("df {}", MOUNT_ARGS.join(" "));
        let host = FakeHost::new().with_failing_command(
            &argv,
            1,
            "",
            "df: cannot read table of mounted file systems",
        );
        let err = collect_mounts(&host).unwrap_err();
        assert_eq!(err.kind, FailureKind::Command);
        assert!(err.message.contains("cannot read table"));
        assert_eq!(
            collect_mounts(&FakeHost::new()).unwrap_err().kind,
            FailureKind::NotInstalled
        );
    }

    #[test]
    fn mounts_ignore_short_rows() {
        let mounts = parse_mounts("Filesystem Size\nbroken row\n");
        assert!(mounts.is_empty());
    }
}
