// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop ksops from starting to serve. Errors of a single request
/// are reported to the caller as [`tonic::Status`] instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing group option, please provide options from one group (Age, AWS, Azure, GCP, Hashicorp Vault or PGP)")]
    MissingCredentials,

    #[error("Options from more than one group are provided: {0}. Please provide options from only one group")]
    AmbiguousCredentials(String),

    #[error("missing {0} address")]
    MissingAddress(&'static str),

    #[error("invalid listen address `{0}`, expected `<protocol>:<address>`")]
    InvalidListenAddress(String),

    #[error("unsupported listen protocol `{0}`, expected one of tcp, tcp4, tcp6 or unix")]
    UnsupportedListenProtocol(String),

    #[error("invalid keyservice address `{address}`: {reason}")]
    InvalidKeyServiceAddress { address: String, reason: String },

    #[error("load config file {path} failed")]
    LoadConfig {
        path: String,
        #[source]
        source: ::config::ConfigError,
    },

    #[error("listen on {address} failed")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("gRPC server failed")]
    Serve(#[from] tonic::transport::Error),
}
