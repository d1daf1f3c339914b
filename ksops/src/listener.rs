// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::{
    fmt,
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{debug, warn};
use tokio::net::{lookup_host, TcpListener, UnixListener};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TcpFamily {
    Any,
    V4,
    V6,
}

impl TcpFamily {
    fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            TcpFamily::Any => true,
            TcpFamily::V4 => addr.is_ipv4(),
            TcpFamily::V6 => addr.is_ipv6(),
        }
    }

    fn protocol(&self) -> &'static str {
        match self {
            TcpFamily::Any => "tcp",
            TcpFamily::V4 => "tcp4",
            TcpFamily::V6 => "tcp6",
        }
    }
}

/// Address the KMS API is served on, written as `<protocol>:<address>`.
///
/// Supported protocols are `tcp`, `tcp4`, `tcp6` and `unix`, e.g.
/// `tcp:127.0.0.1:12345`, `tcp::12345` or `unix:/run/ksops/ksops.sock`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenAddress {
    Tcp { family: TcpFamily, address: String },
    Unix(PathBuf),
}

impl FromStr for ListenAddress {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let (protocol, address) = input
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::InvalidListenAddress(input.to_string()))?;
        if address.is_empty() {
            return Err(Error::InvalidListenAddress(input.to_string()));
        }

        let family = match protocol {
            "tcp" => TcpFamily::Any,
            "tcp4" => TcpFamily::V4,
            "tcp6" => TcpFamily::V6,
            "unix" => return Ok(ListenAddress::Unix(PathBuf::from(address))),
            other => return Err(Error::UnsupportedListenProtocol(other.to_string())),
        };

        Ok(ListenAddress::Tcp {
            family,
            address: address.to_string(),
        })
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::Tcp { family, address } => write!(f, "{}:{address}", family.protocol()),
            ListenAddress::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// A bound listener, ready to be served.
#[derive(Debug)]
pub enum BridgeListener {
    Tcp(TcpListener),
    Unix { listener: UnixListener, path: PathBuf },
}

impl BridgeListener {
    pub async fn bind(address: &ListenAddress) -> Result<Self> {
        let bind_error = |source| Error::Bind {
            address: address.to_string(),
            source,
        };

        match address {
            ListenAddress::Tcp { family, address: host } => {
                // `:port` listens on every interface
                let host = match (host.starts_with(':'), family) {
                    (true, TcpFamily::V6) => format!("[::]{host}"),
                    (true, _) => format!("0.0.0.0{host}"),
                    (false, _) => host.clone(),
                };
                let addr = lookup_host(&host)
                    .await
                    .map_err(bind_error)?
                    .find(|addr| family.accepts(addr))
                    .ok_or_else(|| {
                        bind_error(std::io::Error::new(
                            std::io::ErrorKind::AddrNotAvailable,
                            format!("no {} address found for {host}", family.protocol()),
                        ))
                    })?;
                debug!("Bind tcp listener on {addr}");
                let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
                Ok(BridgeListener::Tcp(listener))
            }
            ListenAddress::Unix(path) => {
                debug!("Bind unix listener on {}", path.display());
                let listener = UnixListener::bind(path).map_err(bind_error)?;
                Ok(BridgeListener::Unix {
                    listener,
                    path: path.clone(),
                })
            }
        }
    }

    /// Local address of a TCP listener, `None` for unix sockets.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            BridgeListener::Tcp(listener) => listener.local_addr().ok(),
            BridgeListener::Unix { .. } => None,
        }
    }
}

/// Remove the socket file once a unix listener is closed.
pub(crate) fn remove_socket_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Failed to remove socket file {}: {e}", path.display());
    }
}
