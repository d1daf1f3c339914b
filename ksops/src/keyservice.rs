// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # sops keyservice client
//!
//! Every call opens its own plaintext connection to the keyservice, runs one
//! RPC under [`KEYSERVICE_DEADLINE`] and drops the connection again. There is
//! no pooling, caching or retrying.

use std::{fmt, future::Future, path::PathBuf, str::FromStr, time::Duration};

use async_trait::async_trait;
use hyper_util::rt::TokioIo;
use log::{debug, error};
use tokio::{net::UnixStream, time::timeout};
use tonic::{
    codegen::http::Uri,
    transport::{Channel, Endpoint},
    Request, Status,
};
use tower::service_fn;

use crate::grpc::keyservice::{
    key_service_client::KeyServiceClient, DecryptRequest, EncryptRequest,
};
use crate::{Error, KeyDescriptor, Result};

/// Upper bound for connecting to the keyservice, and again for the RPC itself.
pub const KEYSERVICE_DEADLINE: Duration = Duration::from_secs(30);

/// Address of a plaintext gRPC endpoint, following the gRPC naming
/// conventions: `unix:<path>`, `unix://<absolute path>`, `tcp://host:port`,
/// `dns:///host:port`, `http://host:port` or `host:port`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrpcAddress {
    /// `http://host:port`
    Tcp(String),
    Unix(PathBuf),
}

impl FromStr for GrpcAddress {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidKeyServiceAddress {
            address: input.to_string(),
            reason: reason.to_string(),
        };

        let address = input.trim();
        if let Some(path) = address
            .strip_prefix("unix://")
            .or_else(|| address.strip_prefix("unix:"))
        {
            if path.is_empty() {
                return Err(invalid("empty socket path"));
            }
            return Ok(GrpcAddress::Unix(PathBuf::from(path)));
        }

        if address.starts_with("https://") {
            return Err(invalid("only plaintext connections are supported"));
        }

        let authority = ["tcp://", "dns:///", "http://"]
            .iter()
            .find_map(|scheme| address.strip_prefix(scheme))
            .unwrap_or(address);
        if authority.is_empty() {
            return Err(invalid("empty host"));
        }
        if authority.contains('/') {
            return Err(invalid("unexpected path after host"));
        }

        let uri = format!("http://{authority}");
        uri.parse::<Uri>().map_err(|e| invalid(&e.to_string()))?;
        Ok(GrpcAddress::Tcp(uri))
    }
}

impl fmt::Display for GrpcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrpcAddress::Tcp(uri) => write!(f, "{uri}"),
            GrpcAddress::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl GrpcAddress {
    /// Open a new connection, waiting at most `connect_timeout`.
    pub async fn connect(
        &self,
        connect_timeout: Duration,
    ) -> std::result::Result<Channel, tonic::transport::Error> {
        match self {
            GrpcAddress::Tcp(uri) => {
                Endpoint::from_shared(uri.clone())?
                    .connect_timeout(connect_timeout)
                    .connect()
                    .await
            }
            GrpcAddress::Unix(path) => {
                let path = path.clone();
                // The uri is not used by the connector below
                Endpoint::from_static("http://[::]:50051")
                    .connect_timeout(connect_timeout)
                    .connect_with_connector(service_fn(move |_: Uri| {
                        let path = path.clone();
                        async move {
                            Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?))
                        }
                    }))
                    .await
            }
        }
    }
}

/// The keyservice operations the KMS provider forwards to.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Encrypt `plaintext` with `key` and return the ciphertext.
    async fn encrypt(
        &self,
        key: &KeyDescriptor,
        plaintext: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, Status>;

    /// Decrypt `ciphertext` with `key` and return the plaintext.
    async fn decrypt(
        &self,
        key: &KeyDescriptor,
        ciphertext: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, Status>;
}

#[derive(Clone, Debug)]
pub struct KeyServiceInvoker {
    address: GrpcAddress,
    deadline: Duration,
}

impl KeyServiceInvoker {
    pub fn new(address: GrpcAddress) -> Self {
        Self {
            address,
            deadline: KEYSERVICE_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Connect to the keyservice and run `rpc` on the new client.
    ///
    /// A failed connection is returned as `UNAVAILABLE` without calling `rpc`.
    /// If `rpc` does not finish within the deadline it is cancelled and
    /// `DEADLINE_EXCEEDED` is returned. Otherwise the result of `rpc` is
    /// returned as is. The connection is closed in every case.
    pub async fn invoke<F, Fut>(&self, rpc: F) -> std::result::Result<Vec<u8>, Status>
    where
        F: FnOnce(KeyServiceClient<Channel>) -> Fut,
        Fut: Future<Output = std::result::Result<Vec<u8>, Status>>,
    {
        debug!("Connecting to sops keyservice on {}", self.address);
        let channel = self.address.connect(self.deadline).await.map_err(|e| {
            error!("Cannot connect to sops keyservice on {}: {e}", self.address);
            Status::unavailable(format!("cannot connect to sops keyservice: {e}"))
        })?;
        debug!("Connected to sops keyservice on {}", self.address);

        let reply = match timeout(self.deadline, rpc(KeyServiceClient::new(channel))).await {
            Ok(reply) => reply,
            Err(_) => {
                error!(
                    "sops keyservice on {} did not reply within {:?}",
                    self.address, self.deadline
                );
                Err(Status::deadline_exceeded(format!(
                    "sops keyservice did not reply within {:?}",
                    self.deadline
                )))
            }
        };
        debug!("Disconnected from sops keyservice on {}", self.address);

        reply
    }
}

#[async_trait]
impl Upstream for KeyServiceInvoker {
    async fn encrypt(
        &self,
        key: &KeyDescriptor,
        plaintext: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, Status> {
        let mut request = Request::new(EncryptRequest {
            key: Some(key.to_key()),
            plaintext,
        });
        request.set_timeout(self.deadline);

        self.invoke(|mut client| async move {
            let reply = client.encrypt(request).await.map_err(|status| {
                error!("Encrypt at sops failed: {status}");
                status
            })?;
            Ok(reply.into_inner().ciphertext)
        })
        .await
    }

    async fn decrypt(
        &self,
        key: &KeyDescriptor,
        ciphertext: Vec<u8>,
    ) -> std::result::Result<Vec<u8>, Status> {
        let mut request = Request::new(DecryptRequest {
            key: Some(key.to_key()),
            ciphertext,
        });
        request.set_timeout(self.deadline);

        self.invoke(|mut client| async move {
            let reply = client.decrypt(request).await.map_err(|status| {
                error!("Decrypt at sops failed: {status}");
                status
            })?;
            Ok(reply.into_inner().plaintext)
        })
        .await
    }
}
