use std::net::IpAddr;

use crate::NodeConfig;
use crate::Result;
use crate::SystemError;

/// First non-loopback IPv4 address of this host.
///
/// A node derives its registry identity from this address, so startup must
/// abort when none exists.
pub fn first_ipv4() -> Result<IpAddr> {
    match local_ip_address::local_ip() {
        Ok(ip @ IpAddr::V4(v4)) if !v4.is_loopback() => Ok(ip),
        Ok(ip) => Err(SystemError::NoRoutableAddress(format!("only {} available", ip)).into()),
        Err(e) => Err(SystemError::NoRoutableAddress(e.to_string()).into()),
    }
}

/// The "ip:port" identity this node advertises through the registry.
///
/// Uses the configured address when one is set, otherwise detects the first
/// non-loopback IPv4 address.
pub fn advertise_identity(config: &NodeConfig) -> Result<String> {
    let ip = if config.advertise_ip.is_empty() {
        first_ipv4()?.to_string()
    } else {
        config.advertise_ip.clone()
    };
    Ok(format!("{}:{}", ip, config.listen_port))
}
