// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use clap::{Args, Parser};
use log::debug;
use serde::{Deserialize, Deserializer};

use crate::{Error, Result};

/// ksops command-line arguments.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server listen address. For example: `tcp:127.0.0.1:12345` or
    /// `unix:/run/ksops/ksops.sock`
    pub listen_address: Option<String>,

    /// sops keyservice address. For example: `unix:///run/sops.sock` or
    /// `tcp://127.0.0.1:5000`
    pub keyservice_address: Option<String>,

    /// Path to a ksops config file. Supported formats: TOML, YAML, JSON and possibly other formats
    /// supported by the `config` crate. Command line arguments take precedence over it.
    #[arg(short, long)]
    pub config_file: Option<String>,

    #[command(flatten)]
    pub credentials: CredentialGroups,
}

/// All credential groups. Exactly one of them is expected to be populated.
#[derive(Args, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialGroups {
    #[command(flatten)]
    pub age: AgeCredentials,

    #[command(flatten)]
    pub aws: AwsCredentials,

    #[command(flatten)]
    pub azure: AzureCredentials,

    #[command(flatten)]
    pub gcp: GcpCredentials,

    #[command(flatten)]
    pub vault: VaultCredentials,

    #[command(flatten)]
    pub pgp: PgpCredentials,
}

impl CredentialGroups {
    pub fn is_empty(&self) -> bool {
        self.age.is_empty()
            && self.aws.is_empty()
            && self.azure.is_empty()
            && self.gcp.is_empty()
            && self.vault.is_empty()
            && self.pgp.is_empty()
    }
}

#[derive(Args, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[command(next_help_heading = "Age Group Options")]
#[serde(default)]
pub struct AgeCredentials {
    /// Age recipient
    #[arg(id = "age-recipient", long = "age-recipient", default_value_t, hide_default_value = true)]
    pub recipient: String,
}

impl AgeCredentials {
    pub fn is_empty(&self) -> bool {
        self.recipient.is_empty()
    }
}

#[derive(Args, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[command(next_help_heading = "AWS Group Options")]
#[serde(default)]
pub struct AwsCredentials {
    /// AWS ARN (Amazon Resource Name)
    #[arg(id = "aws-arn", long = "aws-arn", default_value_t, hide_default_value = true)]
    pub arn: String,

    /// AWS IAM role
    #[arg(id = "aws-role", long = "aws-role", default_value_t, hide_default_value = true)]
    pub role: String,

    /// AWS encryption context, may be given several times
    #[arg(
        id = "aws-context",
        long = "aws-context",
        value_name = "KEY:VALUE",
        value_parser = parse_context_pair
    )]
    #[serde(deserialize_with = "context_from_pairs")]
    pub context: Vec<(String, String)>,

    /// AWS profile
    #[arg(id = "aws-profile", long = "aws-profile", default_value_t, hide_default_value = true)]
    pub profile: String,
}

impl AwsCredentials {
    pub fn is_empty(&self) -> bool {
        self.arn.is_empty()
            && self.role.is_empty()
            && self.context.is_empty()
            && self.profile.is_empty()
    }
}

#[derive(Args, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[command(next_help_heading = "Azure Group Options")]
#[serde(default)]
pub struct AzureCredentials {
    /// Azure vault URL
    #[arg(id = "azure-url", long = "azure-url", default_value_t, hide_default_value = true)]
    pub url: String,

    /// Azure key name
    #[arg(id = "azure-key-name", long = "azure-key-name", default_value_t, hide_default_value = true)]
    pub key_name: String,

    /// Azure key version
    #[arg(id = "azure-key-version", long = "azure-key-version", default_value_t, hide_default_value = true)]
    pub key_version: String,
}

impl AzureCredentials {
    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.key_name.is_empty() && self.key_version.is_empty()
    }
}

#[derive(Args, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[command(next_help_heading = "GCP Group Options")]
#[serde(default)]
pub struct GcpCredentials {
    /// GCP KMS resource ID
    #[arg(id = "gcp-id", long = "gcp-id", default_value_t, hide_default_value = true)]
    pub id: String,
}

impl GcpCredentials {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

#[derive(Args, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[command(next_help_heading = "Hashicorp Vault Group Options")]
#[serde(default)]
pub struct VaultCredentials {
    /// Vault address
    #[arg(id = "vault-address", long = "vault-address", default_value_t, hide_default_value = true)]
    pub address: String,

    /// Vault transit secrets engine path
    #[arg(id = "vault-engine-path", long = "vault-engine-path", default_value_t, hide_default_value = true)]
    pub engine_path: String,

    /// Vault key
    #[arg(id = "vault-key", long = "vault-key", default_value_t, hide_default_value = true)]
    pub key: String,
}

impl VaultCredentials {
    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.engine_path.is_empty() && self.key.is_empty()
    }
}

#[derive(Args, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[command(next_help_heading = "PGP Group Options")]
#[serde(default)]
pub struct PgpCredentials {
    /// PGP key fingerprint
    #[arg(id = "pgp-key", long = "pgp-key", default_value_t, hide_default_value = true)]
    pub key: String,
}

impl PgpCredentials {
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

fn parse_context_pair(pair: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = pair
        .split_once(':')
        .ok_or_else(|| format!("invalid KEY:VALUE: no `:` found in `{pair}`"))?;
    Ok((key.to_string(), value.to_string()))
}

/// Reads the encryption context as a list of `KEY:VALUE` strings. Table keys
/// are lowercased by the `config` crate, strings keep their case.
fn context_from_pairs<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|pair| parse_context_pair(pair).map_err(serde::de::Error::custom))
        .collect()
}

/// Contents of an optional ksops config file.
///
/// ```toml
/// listen = "unix:/run/ksops/ksops.sock"
/// keyservice = "unix:///run/sops.sock"
///
/// [credentials.aws]
/// arn = "arn:aws:kms:us-east-1:000000000000:key/ksops"
/// context = ["Cluster:prod", "app.name:web"]
/// ```
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub listen: Option<String>,
    pub keyservice: Option<String>,
    pub credentials: CredentialGroups,
}

impl TryFrom<&str> for FileConfig {
    type Error = Error;

    fn try_from(config_path: &str) -> Result<Self> {
        let load_error = |source| Error::LoadConfig {
            path: config_path.to_string(),
            source,
        };

        let c = ::config::Config::builder()
            .add_source(::config::File::with_name(config_path))
            .build()
            .map_err(load_error)?;

        c.try_deserialize().map_err(load_error)
    }
}

/// Final configuration of a ksops process, after the config file and
/// the command line are merged.
#[derive(Clone, Debug, PartialEq)]
pub struct BridgeConfig {
    /// `<protocol>:<address>` to serve the KMS API on.
    pub listen: String,

    /// Address of the sops keyservice.
    pub keyservice: String,

    pub credentials: CredentialGroups,
}

impl TryFrom<Cli> for BridgeConfig {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config_file {
            Some(path) => {
                debug!("Read ksops config from {path}");
                FileConfig::try_from(&path[..])?
            }
            None => FileConfig::default(),
        };

        if cli.listen_address.is_some() {
            config.listen = cli.listen_address;
        }
        if cli.keyservice_address.is_some() {
            config.keyservice = cli.keyservice_address;
        }
        // Command line credentials replace the groups of the file as a whole
        if !cli.credentials.is_empty() {
            config.credentials = cli.credentials;
        }

        let listen = config
            .listen
            .filter(|addr| !addr.trim().is_empty())
            .ok_or(Error::MissingAddress("listen"))?;
        let keyservice = config
            .keyservice
            .filter(|addr| !addr.trim().is_empty())
            .ok_or(Error::MissingAddress("keyservice"))?;

        Ok(Self {
            listen,
            keyservice,
            credentials: config.credentials,
        })
    }
}
