//! Utility functions for DFS

use std::net::Ipv4Addr;

use if_addrs::IfAddr;
use uuid::Uuid;

use crate::OWNER_SUFFIX_LEN;

/// Get the local IP address other processes can reach us on
///
/// Prefers a private (site-local) IPv4 address, then any other non-loopback
/// IPv4 address, and falls back to "127.0.0.1".
///
/// # Examples
///
/// ```
/// use dfs_common::local_ip;
///
/// let ip = local_ip();
/// assert!(ip.parse::<std::net::Ipv4Addr>().is_ok());
/// ```
pub fn local_ip() -> String {
    let candidates: Vec<Ipv4Addr> = if_addrs::get_if_addrs()
        .map(|addrs| {
            addrs
                .into_iter()
                .filter(|iface| !iface.is_loopback())
                .filter_map(|iface| match iface.addr {
                    IfAddr::V4(addr) => Some(addr.ip),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    candidates
        .iter()
        .find(|ip| ip.is_private())
        .or_else(|| candidates.first())
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Random lowercase hex suffix used to make owner ids unique per process lifetime
pub fn random_suffix() -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(OWNER_SUFFIX_LEN);
    suffix
}
