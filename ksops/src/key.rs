// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! # Key descriptor
//!
//! The key that every sops keyservice request carries. It is chosen once at
//! startup from the credential groups of the configuration and never changes
//! afterwards.

use log::debug;
use strum::{AsRefStr, Display};

use crate::config::{
    AgeCredentials, AwsCredentials, AzureCredentials, CredentialGroups, GcpCredentials,
    PgpCredentials, VaultCredentials,
};
use crate::grpc::keyservice;
use crate::{Error, Result};

/// Kind of a credential group, in the order in which the groups are
/// looked at.
#[derive(AsRefStr, Display, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKind {
    #[strum(serialize = "Age")]
    Age,
    #[strum(serialize = "AWS")]
    Aws,
    #[strum(serialize = "Azure")]
    Azure,
    #[strum(serialize = "GCP")]
    Gcp,
    #[strum(serialize = "Hashicorp Vault")]
    Vault,
    #[strum(serialize = "PGP")]
    Pgp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyDescriptor {
    Age(AgeCredentials),
    Aws(AwsCredentials),
    Azure(AzureCredentials),
    Gcp(GcpCredentials),
    Vault(VaultCredentials),
    Pgp(PgpCredentials),
}

impl KeyDescriptor {
    pub fn kind(&self) -> CredentialKind {
        match self {
            KeyDescriptor::Age(_) => CredentialKind::Age,
            KeyDescriptor::Aws(_) => CredentialKind::Aws,
            KeyDescriptor::Azure(_) => CredentialKind::Azure,
            KeyDescriptor::Gcp(_) => CredentialKind::Gcp,
            KeyDescriptor::Vault(_) => CredentialKind::Vault,
            KeyDescriptor::Pgp(_) => CredentialKind::Pgp,
        }
    }

    /// Build the `Key` message of the sops keyservice protocol.
    pub fn to_key(&self) -> keyservice::Key {
        use keyservice::key::KeyType;

        let key_type = match self {
            KeyDescriptor::Age(age) => KeyType::AgeKey(keyservice::AgeKey {
                recipient: age.recipient.clone(),
            }),
            KeyDescriptor::Aws(aws) => KeyType::KmsKey(keyservice::KmsKey {
                arn: aws.arn.clone(),
                role: aws.role.clone(),
                // later pairs win, like repeated map flags
                context: aws.context.iter().cloned().collect(),
                aws_profile: aws.profile.clone(),
            }),
            KeyDescriptor::Azure(azure) => {
                KeyType::AzureKeyvaultKey(keyservice::AzureKeyVaultKey {
                    vault_url: azure.url.clone(),
                    name: azure.key_name.clone(),
                    version: azure.key_version.clone(),
                })
            }
            KeyDescriptor::Gcp(gcp) => KeyType::GcpKmsKey(keyservice::GcpKmsKey {
                resource_id: gcp.id.clone(),
            }),
            KeyDescriptor::Vault(vault) => KeyType::VaultKey(keyservice::VaultKey {
                vault_address: vault.address.clone(),
                engine_path: vault.engine_path.clone(),
                key_name: vault.key.clone(),
            }),
            KeyDescriptor::Pgp(pgp) => KeyType::PgpKey(keyservice::PgpKey {
                fingerprint: pgp.key.clone(),
            }),
        };

        keyservice::Key {
            key_type: Some(key_type),
        }
    }
}

impl TryFrom<&CredentialGroups> for KeyDescriptor {
    type Error = Error;

    /// Exactly one group must have a non-empty field. Nothing populated and
    /// more than one group populated are both rejected.
    fn try_from(groups: &CredentialGroups) -> Result<Self> {
        let candidates = [
            (!groups.age.is_empty()).then(|| KeyDescriptor::Age(groups.age.clone())),
            (!groups.aws.is_empty()).then(|| KeyDescriptor::Aws(groups.aws.clone())),
            (!groups.azure.is_empty()).then(|| KeyDescriptor::Azure(groups.azure.clone())),
            (!groups.gcp.is_empty()).then(|| KeyDescriptor::Gcp(groups.gcp.clone())),
            (!groups.vault.is_empty()).then(|| KeyDescriptor::Vault(groups.vault.clone())),
            (!groups.pgp.is_empty()).then(|| KeyDescriptor::Pgp(groups.pgp.clone())),
        ];
        let mut populated: Vec<KeyDescriptor> = candidates.into_iter().flatten().collect();

        match populated.len() {
            0 => Err(Error::MissingCredentials),
            1 => {
                let descriptor = populated.remove(0);
                debug!("Selected {} credential group", descriptor.kind());
                Ok(descriptor)
            }
            _ => {
                let kinds: Vec<String> = populated.iter().map(|d| d.kind().to_string()).collect();
                Err(Error::AmbiguousCredentials(kinds.join(", ")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn age() -> AgeCredentials {
        AgeCredentials {
            recipient: "age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p".into(),
        }
    }

    fn aws() -> AwsCredentials {
        AwsCredentials {
            arn: "arn:aws:kms:us-east-1:000000000000:key/ksops".into(),
            role: "arn:aws:iam::000000000000:role/ksops".into(),
            context: vec![("cluster".into(), "prod".into())],
            profile: "default".into(),
        }
    }

    fn azure() -> AzureCredentials {
        AzureCredentials {
            url: "https://ksops.vault.azure.net".into(),
            key_name: "k8s".into(),
            key_version: "5ddd1e1a0fd34ba2bd7e63a1d8d5d5fb".into(),
        }
    }

    fn gcp() -> GcpCredentials {
        GcpCredentials {
            id: "projects/ksops/locations/global/keyRings/k8s/cryptoKeys/etcd".into(),
        }
    }

    fn vault() -> VaultCredentials {
        VaultCredentials {
            address: "http://127.0.0.1:8200".into(),
            engine_path: "transit".into(),
            key: "k8s".into(),
        }
    }

    fn pgp() -> PgpCredentials {
        PgpCredentials {
            key: "FBC7B9E2A4F9289AC0C1D4843D16CEE4A27381B4".into(),
        }
    }

    #[rstest]
    #[case(CredentialGroups { age: age(), ..Default::default() }, KeyDescriptor::Age(age()))]
    #[case(CredentialGroups { aws: aws(), ..Default::default() }, KeyDescriptor::Aws(aws()))]
    #[case(CredentialGroups { azure: azure(), ..Default::default() }, KeyDescriptor::Azure(azure()))]
    #[case(CredentialGroups { gcp: gcp(), ..Default::default() }, KeyDescriptor::Gcp(gcp()))]
    #[case(CredentialGroups { vault: vault(), ..Default::default() }, KeyDescriptor::Vault(vault()))]
    #[case(CredentialGroups { pgp: pgp(), ..Default::default() }, KeyDescriptor::Pgp(pgp()))]
    fn select_single_group(#[case] groups: CredentialGroups, #[case] expected: KeyDescriptor) {
        let descriptor = KeyDescriptor::try_from(&groups).expect("select credential group");
        assert_eq!(descriptor, expected);
    }

    #[rstest]
    #[case(AwsCredentials { role: "admin".into(), ..Default::default() })]
    #[case(AwsCredentials { profile: "default".into(), ..Default::default() })]
    #[case(AwsCredentials { context: vec![("k".into(), "v".into())], ..Default::default() })]
    fn any_field_populates_a_group(#[case] aws: AwsCredentials) {
        let groups = CredentialGroups {
            aws: aws.clone(),
            ..Default::default()
        };
        let descriptor = KeyDescriptor::try_from(&groups).expect("select credential group");
        assert_eq!(descriptor, KeyDescriptor::Aws(aws));
    }

    #[test]
    fn no_group_is_fatal() {
        let res = KeyDescriptor::try_from(&CredentialGroups::default());
        assert!(matches!(res, Err(Error::MissingCredentials)));
    }

    #[test]
    fn several_groups_are_ambiguous() {
        let groups = CredentialGroups {
            age: age(),
            vault: vault(),
            ..Default::default()
        };
        match KeyDescriptor::try_from(&groups) {
            Err(Error::AmbiguousCredentials(kinds)) => assert_eq!(kinds, "Age, Hashicorp Vault"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn aws_key_message() {
        let mut aws = aws();
        aws.context.push(("cluster".into(), "staging".into()));
        aws.context.push(("app".into(), "web".into()));

        let key = KeyDescriptor::Aws(aws).to_key();
        let expected = keyservice::KmsKey {
            arn: "arn:aws:kms:us-east-1:000000000000:key/ksops".into(),
            role: "arn:aws:iam::000000000000:role/ksops".into(),
            context: HashMap::from([
                ("cluster".to_string(), "staging".to_string()),
                ("app".to_string(), "web".to_string()),
            ]),
            aws_profile: "default".into(),
        };
        assert_eq!(
            key.key_type,
            Some(keyservice::key::KeyType::KmsKey(expected))
        );
    }

    #[rstest]
    #[case(
        KeyDescriptor::Age(age()),
        keyservice::key::KeyType::AgeKey(keyservice::AgeKey { recipient: age().recipient })
    )]
    #[case(
        KeyDescriptor::Azure(azure()),
        keyservice::key::KeyType::AzureKeyvaultKey(keyservice::AzureKeyVaultKey {
            vault_url: azure().url,
            name: azure().key_name,
            version: azure().key_version,
        })
    )]
    #[case(
        KeyDescriptor::Gcp(gcp()),
        keyservice::key::KeyType::GcpKmsKey(keyservice::GcpKmsKey { resource_id: gcp().id })
    )]
    #[case(
        KeyDescriptor::Vault(vault()),
        keyservice::key::KeyType::VaultKey(keyservice::VaultKey {
            vault_address: vault().address,
            engine_path: vault().engine_path,
            key_name: vault().key,
        })
    )]
    #[case(
        KeyDescriptor::Pgp(pgp()),
        keyservice::key::KeyType::PgpKey(keyservice::PgpKey { fingerprint: pgp().key })
    )]
    fn key_message(#[case] descriptor: KeyDescriptor, #[case] expected: keyservice::key::KeyType) {
        assert_eq!(descriptor.to_key().key_type, Some(expected));
    }
}
