/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;

mod error;
pub use error::{BoxError, GeoIpDbError, LookupError};

mod decoder;
pub use decoder::SnapshotDecoder;

mod config;
pub use config::{GeoIpDbConfig, SnapshotLocation};

mod db;
pub use db::GeoIpDatabase;

pub mod file;
pub mod remote;

mod event;
mod store;
mod update;
mod watch;

#[cfg(feature = "maxminddb")]
pub type MaxMindDatabase = GeoIpDatabase<maxminddb::Reader<Vec<u8>>>;

/// The local copy of a snapshot downloaded from an url.
pub fn default_cache_file() -> PathBuf {
    std::env::temp_dir().join("g3-geoip").join("db.gz")
}
