//! Source address allow-list.

use std::net::IpAddr;

use tracing::warn;

use sftt_protocol::DEFAULT_ALLOWED_IP;

/// Admits requests whose source address is on a fixed list.
///
/// Matching is exact (no CIDR ranges). IPv4-mapped IPv6 peers such as
/// `::ffff:127.0.0.1` are compared in their IPv4 form.
#[derive(Debug, Clone)]
pub struct AccessGate {
    allowed: Vec<String>,
}

impl AccessGate {
    /// Builds a gate from list entries. An empty list admits `127.0.0.1`.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed: Vec<String> = entries
            .into_iter()
            .filter_map(|e| canonical_entry(e.as_ref()))
            .collect();
        if allowed.is_empty() {
            allowed.push(DEFAULT_ALLOWED_IP.to_string());
        }
        allowed.dedup();
        Self { allowed }
    }

    /// Builds a gate from a comma-separated list.
    pub fn from_list(list: &str) -> Self {
        Self::new(parse_allow_list(list))
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Returns `true` if `peer` may issue requests.
    pub fn admits(&self, peer: IpAddr) -> bool {
        let peer = peer.to_canonical().to_string();
        self.allowed.iter().any(|a| *a == peer)
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new([DEFAULT_ALLOWED_IP])
    }
}

/// Splits a comma-separated allow-list, dropping blank and invalid entries.
pub fn parse_allow_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .filter_map(canonical_entry)
        .collect()
}

fn canonical_entry(entry: &str) -> Option<String> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    match entry.parse::<IpAddr>() {
        Ok(ip) => Some(ip.to_canonical().to_string()),
        Err(_) => {
            warn!(entry, "ignoring invalid allow-list entry");
            None
        }
    }
}
