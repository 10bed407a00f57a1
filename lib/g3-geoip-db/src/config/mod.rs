/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::remote::{HttpSnapshotSource, SnapshotSource};
use crate::update::UpdateConfig;
use crate::{GeoIpDatabase, GeoIpDbError, SnapshotDecoder};

#[cfg(feature = "yaml")]
mod yaml;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotLocation {
    File(PathBuf),
    Url(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeoIpDbConfig {
    pub(crate) location: SnapshotLocation,
    pub(crate) cache_file: Option<PathBuf>,
    pub(crate) download_dir: Option<PathBuf>,
    pub(crate) refresh_interval: Duration,
    pub(crate) initial_retry_interval: Duration,
    pub(crate) max_retry_interval: Duration,
    pub(crate) watch_debounce: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
}

impl GeoIpDbConfig {
    fn new(location: SnapshotLocation) -> Self {
        GeoIpDbConfig {
            location,
            cache_file: None,
            download_dir: None,
            refresh_interval: Duration::from_secs(24 * 60 * 60),
            initial_retry_interval: Duration::from_secs(5),
            max_retry_interval: Duration::from_secs(60 * 60),
            watch_debounce: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_local_file(file: &Path) -> Self {
        GeoIpDbConfig::new(SnapshotLocation::File(file.to_path_buf()))
    }

    pub fn with_url(url: &str) -> Self {
        GeoIpDbConfig::new(SnapshotLocation::Url(url.to_string()))
    }

    pub fn location(&self) -> &SnapshotLocation {
        &self.location
    }

    pub fn set_location(&mut self, location: SnapshotLocation) {
        self.location = location;
    }

    /// Set the local copy of a remote snapshot.
    pub fn set_cache_file(&mut self, file: PathBuf) {
        self.cache_file = Some(file);
    }

    /// Set the directory to store temp files while downloading.
    ///
    /// It should be on the same filesystem as the local file. The directory of
    /// the local file is used if not set.
    pub fn set_download_dir(&mut self, dir: PathBuf) {
        self.download_dir = Some(dir);
    }

    pub fn set_refresh_interval(&mut self, interval: Duration) {
        self.refresh_interval = interval;
    }

    pub fn set_initial_retry_interval(&mut self, interval: Duration) {
        self.initial_retry_interval = interval;
    }

    pub fn set_max_retry_interval(&mut self, interval: Duration) {
        self.max_retry_interval = interval;
    }

    pub fn set_watch_debounce(&mut self, time: Duration) {
        self.watch_debounce = time;
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    /// Set the max idle time between two reads on a http connection.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// The snapshot file the database is loaded from.
    pub fn local_file(&self) -> PathBuf {
        match &self.location {
            SnapshotLocation::File(p) => p.clone(),
            SnapshotLocation::Url(_) => self
                .cache_file
                .clone()
                .unwrap_or_else(crate::default_cache_file),
        }
    }

    fn update_config(&self) -> UpdateConfig {
        UpdateConfig {
            refresh_interval: self.refresh_interval,
            initial_retry_interval: self.initial_retry_interval,
            max_retry_interval: self.max_retry_interval,
            download_dir: self.download_dir.clone().unwrap_or_else(|| {
                match self.local_file().parent() {
                    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                    _ => PathBuf::from("."),
                }
            }),
        }
    }

    pub async fn open<D: SnapshotDecoder>(&self) -> Result<GeoIpDatabase<D>, GeoIpDbError> {
        match &self.location {
            SnapshotLocation::File(p) => {
                GeoIpDatabase::open_local(p.clone(), self.watch_debounce).await
            }
            SnapshotLocation::Url(url) => {
                let source = HttpSnapshotSource::new(url, self.connect_timeout, self.read_timeout)
                    .map_err(GeoIpDbError::Config)?;
                self.open_with_source(Arc::new(source)).await
            }
        }
    }

    /// Open the database with the local file refreshed from `source`.
    pub async fn open_with_source<D: SnapshotDecoder>(
        &self,
        source: Arc<dyn SnapshotSource>,
    ) -> Result<GeoIpDatabase<D>, GeoIpDbError> {
        GeoIpDatabase::open_remote(
            self.local_file(),
            source,
            self.update_config(),
            self.watch_debounce,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_file() {
        let config = GeoIpDbConfig::with_local_file(Path::new("/data/geoip.mmdb.gz"));
        assert_eq!(config.local_file(), PathBuf::from("/data/geoip.mmdb.gz"));

        let mut config = GeoIpDbConfig::with_url("https://example.net/db.gz");
        assert_eq!(config.local_file(), crate::default_cache_file());
        config.set_cache_file(PathBuf::from("/var/cache/db.gz"));
        assert_eq!(config.local_file(), PathBuf::from("/var/cache/db.gz"));
    }

    #[test]
    fn update_defaults() {
        let mut config = GeoIpDbConfig::with_url("https://example.net/db.gz");
        let update = config.update_config();
        assert_eq!(update.initial_retry_interval, Duration::from_secs(5));
        assert_eq!(update.download_dir, std::env::temp_dir().join("g3-geoip"));

        config.set_download_dir(PathBuf::from("/var/tmp"));
        config.set_refresh_interval(Duration::from_secs(600));
        let update = config.update_config();
        assert_eq!(update.download_dir, PathBuf::from("/var/tmp"));
        assert_eq!(update.refresh_interval, Duration::from_secs(600));
    }

    #[test]
    fn download_dir_follows_cache_file() {
        let mut config = GeoIpDbConfig::with_url("https://example.net/db.gz");
        config.set_cache_file(PathBuf::from("/dev/shm/geoip/db.gz"));
        let update = config.update_config();
        assert_eq!(update.download_dir, PathBuf::from("/dev/shm/geoip"));

        config.set_cache_file(PathBuf::from("db.gz"));
        let update = config.update_config();
        assert_eq!(update.download_dir, PathBuf::from("."));

        config.set_download_dir(PathBuf::from("/var/tmp"));
        let update = config.update_config();
        assert_eq!(update.download_dir, PathBuf::from("/var/tmp"));
    }
}
