/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;

use serde::de::DeserializeOwned;

/// A queryable record store built from the decompressed snapshot bytes.
///
/// An instance is immutable once built. It is released, by drop, after a newer
/// instance has been installed or when the owning database is closed.
pub trait SnapshotDecoder: Send + Sync + Sized + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn decode(buf: Vec<u8>) -> Result<Self, Self::Error>;

    fn lookup<T: DeserializeOwned>(&self, ip: IpAddr) -> Result<T, Self::Error>;
}

#[cfg(feature = "maxminddb")]
mod mmdb {
    use super::*;

    use maxminddb::{MaxMindDBError, Reader};

    impl SnapshotDecoder for Reader<Vec<u8>> {
        type Error = MaxMindDBError;

        fn decode(buf: Vec<u8>) -> Result<Self, Self::Error> {
            Reader::from_source(buf)
        }

        fn lookup<T: DeserializeOwned>(&self, ip: IpAddr) -> Result<T, Self::Error> {
            Reader::lookup(self, ip)
        }
    }
}
