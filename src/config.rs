use std::net::SocketAddr;

/// How many times a job is re-queued after a transient worker failure or
/// disconnect before it is marked permanently failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address clients connect to for submit/status/results requests.
    pub client_addr: SocketAddr,
    /// Address workers connect to for the long-lived worker channel.
    pub worker_addr: SocketAddr,
    /// Retry budget per job.
    pub max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            client_addr: "127.0.0.1:1209"
                .parse()
                .expect("default client address is valid"),
            worker_addr: "127.0.0.1:1205"
                .parse()
                .expect("default worker address is valid"),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ServerConfig {
    pub fn new(client_addr: SocketAddr, worker_addr: SocketAddr) -> Self {
        Self {
            client_addr,
            worker_addr,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_default() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.client_addr.to_string(), "127.0.0.1:1209");
        assert_eq!(cfg.worker_addr.to_string(), "127.0.0.1:1205");
        assert_eq!(cfg.max_retries, 3);
    }

    #[test]
    fn server_config_new() {
        let client: SocketAddr = "10.0.0.1:9000".parse().unwrap();
        let worker: SocketAddr = "10.0.0.1:9001".parse().unwrap();
        let cfg = ServerConfig::new(client, worker);
        assert_eq!(cfg.client_addr, client);
        assert_eq!(cfg.worker_addr, worker);
        assert_eq!(cfg.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn server_config_with_max_retries() {
        let cfg = ServerConfig::default().with_max_retries(5);
        assert_eq!(cfg.max_retries, 5);
    }
}
