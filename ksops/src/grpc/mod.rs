// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::future::Future;

use log::{debug, error, info, warn};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tonic::{transport::Server, Request, Response, Status};

use kms::key_management_service_server::{KeyManagementService, KeyManagementServiceServer};
use kms::{
    DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, VersionRequest,
    VersionResponse,
};

use crate::keyservice::Upstream;
use crate::listener::{remove_socket_file, BridgeListener};
use crate::{KeyDescriptor, Result, PROGRAM_NAME, PROGRAM_VERSION};

/// Kubernetes KMS plugin API, implemented by ksops.
pub mod kms {
    #![allow(unknown_lints)]
    #![allow(clippy::derive_partial_eq_without_eq)]
    tonic::include_proto!("v1beta1");
}

/// sops keyservice API, used by ksops.
pub mod keyservice {
    #![allow(unknown_lints)]
    #![allow(clippy::derive_partial_eq_without_eq)]
    tonic::include_proto!("_");
}

/// The only KMS API version ksops speaks.
pub const KMS_API_VERSION: &str = "v1beta1";

/// KMS provider which forwards every request to an [`Upstream`] with
/// the same key.
pub struct KmsProvider<U> {
    key: KeyDescriptor,
    upstream: U,
}

impl<U: Upstream> KmsProvider<U> {
    pub fn new(key: KeyDescriptor, upstream: U) -> Self {
        Self { key, upstream }
    }
}

fn check_version(version: &str) -> std::result::Result<(), Status> {
    if version != KMS_API_VERSION {
        warn!("[KMS] Request version incompatible: {version}");
        return Err(Status::unimplemented("Incompatible request version"));
    }

    Ok(())
}

#[tonic::async_trait]
impl<U: Upstream + 'static> KeyManagementService for KmsProvider<U> {
    async fn version(
        &self,
        request: Request<VersionRequest>,
    ) -> std::result::Result<Response<VersionResponse>, Status> {
        debug!("[KMS] Version request: version: {}", request.get_ref().version);

        let reply = VersionResponse {
            version: KMS_API_VERSION.to_string(),
            runtime_name: PROGRAM_NAME.to_string(),
            runtime_version: PROGRAM_VERSION.to_string(),
        };

        Ok(Response::new(reply))
    }

    async fn decrypt(
        &self,
        request: Request<DecryptRequest>,
    ) -> std::result::Result<Response<DecryptResponse>, Status> {
        let request = request.into_inner();
        debug!(
            "[KMS] get new Decrypt request: version: {}, {} bytes of cipher",
            request.version,
            request.cipher.len()
        );
        check_version(&request.version)?;

        let plain = self
            .upstream
            .decrypt(&self.key, request.cipher)
            .await
            .map_err(|status| {
                error!("[KMS] Decrypt with sops keyservice failed: {status}");
                status
            })?;

        debug!("[KMS] Decrypt successfully, {} bytes of plain", plain.len());

        Ok(Response::new(DecryptResponse { plain }))
    }

    async fn encrypt(
        &self,
        request: Request<EncryptRequest>,
    ) -> std::result::Result<Response<EncryptResponse>, Status> {
        let request = request.into_inner();
        debug!(
            "[KMS] get new Encrypt request: version: {}, {} bytes of plain",
            request.version,
            request.plain.len()
        );
        check_version(&request.version)?;

        let cipher = self
            .upstream
            .encrypt(&self.key, request.plain)
            .await
            .map_err(|status| {
                error!("[KMS] Encrypt with sops keyservice failed: {status}");
                status
            })?;

        debug!("[KMS] Encrypt successfully, {} bytes of cipher", cipher.len());

        Ok(Response::new(EncryptResponse { cipher }))
    }
}

/// Serve the KMS API on `listener` until `shutdown` resolves, then wait for
/// the requests in flight before returning. A unix socket file is removed
/// once the listener is closed.
pub async fn start_service<U, S>(
    listener: BridgeListener,
    provider: KmsProvider<U>,
    shutdown: S,
) -> Result<()>
where
    U: Upstream + 'static,
    S: Future<Output = ()> + Send,
{
    let router = Server::builder().add_service(KeyManagementServiceServer::new(provider));

    match listener {
        BridgeListener::Tcp(listener) => {
            router
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
                .await?;
        }
        BridgeListener::Unix { listener, path } => {
            let res = router
                .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown)
                .await;
            remove_socket_file(&path);
            res?;
        }
    }

    info!("KMS service stopped");
    Ok(())
}
