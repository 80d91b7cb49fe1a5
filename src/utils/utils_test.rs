use super::net;
use super::util;
use crate::NodeConfig;

#[test]
fn test_rand_token_is_hex_of_requested_width() {
    let token = util::rand_token(16);
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_rand_tokens_differ() {
    assert_ne!(util::rand_token(16), util::rand_token(16));
}

#[test]
fn test_host_info_shape() {
    let info = util::host_info();
    assert!(info.starts_with("OS:["));
    assert!(info.contains("Arch:["));
    assert!(info.contains("CPUS:["));
}

#[test]
fn test_advertise_identity_uses_configured_address() {
    let config = NodeConfig {
        advertise_ip: "10.1.2.3".to_string(),
        listen_port: 8123,
        ..NodeConfig::default()
    };
    let identity = net::advertise_identity(&config).expect("should succeed");
    assert_eq!(identity, "10.1.2.3:8123");
}
