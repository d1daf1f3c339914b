// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # ksops
//!
//! A Kubernetes KMS (v1beta1) plugin which does no cryptography itself. Every
//! `Encrypt`/`Decrypt` request is forwarded to a sops keyservice together
//! with one [`KeyDescriptor`] that is fixed when the process starts.

pub mod config;
pub use crate::config::*;

pub mod error;
pub use crate::error::*;

pub mod grpc;

pub mod key;
pub use crate::key::*;

pub mod keyservice;

pub mod listener;

/// Name reported as `runtime_name` by the `Version` API.
pub const PROGRAM_NAME: &str = "ksops";

/// Reported as `runtime_version` by the `Version` API.
pub const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");
