use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Answers whether the network is usable before any request is issued
pub trait Connectivity {
    fn is_online(&self) -> bool;
}

/// Considers the network up when a TCP connection to `addr` succeeds
pub struct NetworkProbe {
    addr: String,
    timeout: Duration,
}

impl NetworkProbe {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Connectivity for NetworkProbe {
    fn is_online(&self) -> bool {
        let addrs = match self.addr.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::debug!("cannot resolve {}: {}", self.addr, e);
                return false;
            }
        };

        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => return true,
                Err(e) => tracing::debug!("probe {addr} failed: {e}"),
            }
        }
        false
    }
}
