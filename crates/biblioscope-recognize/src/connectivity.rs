use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

/// Answers whether remote lookups can currently be attempted.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Never reports the network as down.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl Connectivity for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Online when a TCP connection to `address` opens within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(address = %self.address, error = %e, "connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(address = %self.address, "connectivity probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn local_listener_is_online() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let check = TcpProbe::new(addr.to_string(), Duration::from_secs(2));
        assert!(check.is_online().await);
    }

    #[tokio::test]
    async fn closed_port_is_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let check = TcpProbe::new(addr.to_string(), Duration::from_secs(2));
        assert!(!check.is_online().await);
    }

    #[tokio::test]
    async fn always_online() {
        assert!(AlwaysOnline.is_online().await);
    }
}
