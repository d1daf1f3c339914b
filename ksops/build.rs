// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::io;

fn main() -> Result<(), io::Error> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(
            &["protos/kms_v1beta1.proto", "protos/keyservice.proto"],
            &["protos"],
        )?;
    Ok(())
}
