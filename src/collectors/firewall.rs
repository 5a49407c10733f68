use crate::collectors::stdout_of;
use crate::host::Host;
use crate::state::{BlockedPair, FirewallStat, ProbeError};
use std::collections::HashMap;
use std::hash::Hash;

const BLOCK_TAG: &str = "[UFW BLOCK]";
const LOG_TAIL_LINES: usize = 1000;
const TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEvent<'a> {
    pub src: &'a str,
    pub dpt: &'a str,
}

pub fn collect_firewall(host: &dyn Host) -> Result<FirewallStat, ProbeError> {
    let status = stdout_of(host, "ufw", &["status"])?;
    if !status.contains("Status: active") {
        return Ok(FirewallStat::inactive());
    }

    match stdout_of(host, "dmesg", &[]) {
        Ok(log) => Ok(summarize_blocks(&log)),
        Err(err) => Ok(FirewallStat {
            active: true,
            error: Some(err),
            ..FirewallStat::inactive()
        }),
    }
}

pub fn summarize_blocks(log: &str) -> FirewallStat {
    let tagged: Vec<&str> = log.lines().filter(|l| l.contains(BLOCK_TAG)).collect();
    let recent = &tagged[tagged.len().saturating_sub(LOG_TAIL_LINES)..];

    let mut pairs = Tally::default();
    let mut ports = Tally::default();
    for event in recent.iter().filter_map(|line| parse_block_event(line)) {
        pairs.add((event.src, event.dpt));
        ports.add(event.dpt);
    }

    FirewallStat {
        active: true,
        top_blocked: pairs
            .top(TOP_N)
            .into_iter()
            .map(|((ip, port), count)| BlockedPair {
                ip: ip.to_string(),
                port: port.to_string(),
                count,
            })
            .collect(),
        ports: ports
            .top(TOP_N)
            .into_iter()
            .map(|(port, count)| (port.to_string(), count))
            .collect(),
        error: None,
    }
}

pub fn parse_block_event(line: &str) -> Option<BlockEvent<'_>> {
    Some(BlockEvent {
        src: field(line, "SRC=")?,
        dpt: field(line, "DPT=")?,
    })
}

fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.match_indices(key).find_map(|(at, _)| {
        let rest = &line[at + key.len()..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let value = &rest[..end];
        (!value.is_empty()).then_some(value)
    })
}

struct Tally<K> {
    counts: Vec<(K, u64)>,
    index: HashMap<K, usize>,
}

impl<K> Default for Tally<K> {
    fn default() -> Self {
        Self {
            counts: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> Tally<K> {
    fn add(&mut self, key: K) {
        match self.index.get(&key) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(key.clone(), self.counts.len());
                self.counts.push((key, 1));
            }
        }
    }

    fn top(mut self, n: usize) -> Vec<(K, u64)> {
        self.counts.sort_by(|a, b| b.1.cmp(&a.1));
        self.counts.truncate(n);
        self.counts
    }
}
