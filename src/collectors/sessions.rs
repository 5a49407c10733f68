use crate::collectors::stdout_of;
use crate::host::Host;
use crate::state::ProbeError;
use std::collections::BTreeSet;

pub fn collect_users(host: &dyn Host) -> Result<Vec<String>, ProbeError> {
    let out = stdout_of(host, "who", &[])?;
    let users: BTreeSet<&str> = out
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    Ok(users.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;

    #[test]
    fn users_are_sorted_and_unique() {
        let who = "\
root     tty1         2026-10-15 08:12
kamil    pts/0        2026-10-16 09:01 (10.0.0.5)
alice    pts/1        2026-10-16 09:30 (10.0.0.7)
kamil    pts/2        2026-10-16 10:44 (10.0.0.5)
";
        let host = FakeHost::new().with_command("who", who);
        assert_eq!(collect_users(&host).unwrap(), vec!["alice", "kamil", "root"]);
    }

    #[test]
    fn nobody_logged_in() {
        let host = FakeHost::new().with_command("who", "");
        assert!(collect_users(&host).unwrap().is_empty());
    }

    #[test]
    fn missing_who_is_an_error() {
        assert!(collect_users(&FakeHost::new()).is_err());
    }
}
