//! Shared API constants

/// Default port of the lock authority
pub const DEFAULT_LOCK_PORT: u16 = 7100;

/// Default port of the extent service
pub const DEFAULT_EXTENT_PORT: u16 = 7200;

/// Default port of the front-end coordinator (also hosts the callback endpoint)
pub const DEFAULT_FRONTEND_PORT: u16 = 7300;

/// Default connect timeout for short-lived callback connections
pub const DEFAULT_CALLBACK_CONNECT_TIMEOUT_MS: u64 = 3000;

/// Turn a `host:port` address into a URI tonic can connect to
pub fn grpc_uri(addr: &str) -> String {
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grpc_uri() {
        assert_eq!(grpc_uri("127.0.0.1:7100"), "http://127.0.0.1:7100");
        assert_eq!(grpc_uri("http://lock:7100"), "http://lock:7100");
    }

    #[test]
    fn test_default_ports_distinct() {
        assert_ne!(DEFAULT_LOCK_PORT, DEFAULT_EXTENT_PORT);
        assert_ne!(DEFAULT_EXTENT_PORT, DEFAULT_FRONTEND_PORT);
    }
}
