use crate::host::HostError;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotInstalled,
    Parse,
    Command,
    Unavailable,
    Panicked,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::NotInstalled => "not_installed",
            FailureKind::Parse => "parse",
            FailureKind::Command => "command",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ProbeError {
    pub kind: FailureKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, message)
    }

    pub fn command(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Command, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unavailable, message)
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Panicked, message)
    }
}

impl From<HostError> for ProbeError {
    fn from(err: HostError) -> Self {
        let kind = match &err {
            HostError::NotFound { .. } => FailureKind::NotInstalled,
            HostError::Spawn { .. } | HostError::Timeout { .. } => FailureKind::Command,
            HostError::Read { .. } => FailureKind::Unavailable,
        };
        Self::new(kind, err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    #[cfg(test)]
    pub fn push(&mut self, key: impl Into<String>, value: V) {
        self.0.push((key.into(), value));
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuStat {
    pub usage: String,
    pub model: String,
    pub cores: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
}

impl CpuStat {
    pub fn unavailable(err: ProbeError) -> Self {
        Self {
            usage: NOT_AVAILABLE.to_string(),
            model: err.message.clone(),
            cores: NOT_AVAILABLE.to_string(),
            error: Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStat {
    pub total: String,
    pub used: String,
    pub percent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
}

impl MemoryStat {
    pub fn unavailable(err: ProbeError) -> Self {
        Self {
            total: NOT_AVAILABLE.to_string(),
            used: NOT_AVAILABLE.to_string(),
            percent: "0%".to_string(),
            error: Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskStat {
    pub total: String,
    pub used: String,
    pub free: String,
    pub percent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
}

impl DiskStat {
    pub fn unavailable(err: ProbeError) -> Self {
        Self {
            total: NOT_AVAILABLE.to_string(),
            used: NOT_AVAILABLE.to_string(),
            free: NOT_AVAILABLE.to_string(),
            percent: "0%".to_string(),
            error: Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountStat {
    pub source: String,
    pub size: String,
    pub used: String,
    pub avail: String,
    pub percent: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerStat {
    pub name: String,
    pub image: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockedPair {
    pub ip: String,
    pub port: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirewallStat {
    pub active: bool,
    pub top_blocked: Vec<BlockedPair>,
    pub ports: OrderedMap<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
}

impl FirewallStat {
    pub fn inactive() -> Self {
        Self {
            active: false,
            top_blocked: Vec::new(),
            ports: OrderedMap::new(),
            error: None,
        }
    }

    pub fn unavailable(err: ProbeError) -> Self {
        Self {
            error: Some(err),
            ..Self::inactive()
        }
    }

    pub fn blocked_events(&self) -> u64 {
        self.ports.iter().map(|(_, count)| *count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStat {
    pub hostname: String,
    pub uptime: String,
    pub kernel: String,
    pub os: String,
    pub last_update: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
}

impl SystemStat {
    pub fn unavailable(err: ProbeError) -> Self {
        Self {
            hostname: NOT_AVAILABLE.to_string(),
            uptime: NOT_AVAILABLE.to_string(),
            kernel: NOT_AVAILABLE.to_string(),
            os: NOT_AVAILABLE.to_string(),
            last_update: NOT_AVAILABLE.to_string(),
            error: Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub cpu: CpuStat,
    pub memory: MemoryStat,
    pub disk: DiskStat,
    pub mounts: Vec<MountStat>,
    pub users: Vec<String>,
    pub services: OrderedMap<String>,
    pub docker_containers: Option<Vec<ContainerStat>>,
    pub system: SystemStat,
    pub ufw: FirewallStat,
}

impl Snapshot {
    pub const KEYS: [&'static str; 9] = [
        "cpu",
        "memory",
        "disk",
        "mounts",
        "users",
        "services",
        "docker_containers",
        "system",
        "ufw",
    ];
}

#[cfg(test)]
impl Snapshot {
    pub fn all_failed(message: &str) -> Self {
        let err = ProbeError::unavailable(message);
        Self {
            cpu: CpuStat::unavailable(err.clone()),
            memory: MemoryStat::unavailable(err.clone()),
            disk: DiskStat::unavailable(err.clone()),
            mounts: Vec::new(),
            users: Vec::new(),
            services: OrderedMap::new(),
            docker_containers: None,
            system: SystemStat::unavailable(err.clone()),
            ufw: FirewallStat::unavailable(err),
        }
    }
}
