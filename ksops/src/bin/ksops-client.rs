// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! This tool is to test a running ksops KMS provider

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use clap::{Args, Parser, Subcommand};
use ksops::{
    grpc::{
        kms::{
            key_management_service_client::KeyManagementServiceClient, DecryptRequest,
            EncryptRequest, VersionRequest,
        },
        KMS_API_VERSION,
    },
    keyservice::{GrpcAddress, KEYSERVICE_DEADLINE},
};
use tokio::time::timeout;

#[derive(Parser)]
#[command(name = "ksops-client")]
#[command(bin_name = "ksops-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    operation: Operation,

    /// KMS provider address, e.g. `unix:///run/ksops/ksops.sock` or `127.0.0.1:12345`
    #[arg(short, long)]
    address: String,

    /// KMS API version sent with the request
    #[arg(long, default_value_t = KMS_API_VERSION.to_string())]
    api_version: String,
}

#[derive(Subcommand)]
enum Operation {
    /// Ask for the KMS API version and runtime of the provider
    Version,

    /// Encrypt the given plaintext, the ciphertext is printed base64 encoded
    Encrypt(EncryptArgs),

    /// Decrypt the content of a file, the plaintext is printed base64 encoded
    Decrypt(DecryptArgs),
}

#[derive(Args)]
struct EncryptArgs {
    /// plaintext to encrypt
    #[arg(short, long, default_value = "0123456")]
    plaintext: String,
}

#[derive(Args)]
struct DecryptArgs {
    /// path to the file which contains the ciphertext
    #[arg(short, long)]
    cipher_path: String,
}

async fn call(cli: Cli) -> Result<String> {
    let address: GrpcAddress = cli.address.parse()?;
    let channel = address
        .connect(KEYSERVICE_DEADLINE)
        .await
        .with_context(|| format!("Cannot connect to KMS provider on {address}"))?;
    let mut client = KeyManagementServiceClient::new(channel);
    let version = cli.api_version;

    let output = match cli.operation {
        Operation::Version => {
            let res = client.version(VersionRequest { version }).await?.into_inner();
            format!(
                "version: {}, runtime: {} {}",
                res.version, res.runtime_name, res.runtime_version
            )
        }
        Operation::Encrypt(arg) => {
            let req = EncryptRequest {
                version,
                plain: arg.plaintext.into_bytes(),
            };
            let res = client.encrypt(req).await?.into_inner();
            STANDARD.encode(res.cipher)
        }
        Operation::Decrypt(arg) => {
            let cipher = tokio::fs::read(&arg.cipher_path)
                .await
                .with_context(|| format!("read {}", arg.cipher_path))?;
            let res = client
                .decrypt(DecryptRequest { version, cipher })
                .await?
                .into_inner();
            STANDARD.encode(res.plain)
        }
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = timeout(KEYSERVICE_DEADLINE, call(cli))
        .await
        .context("KMS provider did not reply in time")??;
    println!("{output}");

    Ok(())
}
