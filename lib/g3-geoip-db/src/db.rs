/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};

use crate::event::{CloseSignal, EventSlot};
use crate::file::{self, LoadedSnapshot};
use crate::remote::SnapshotSource;
use crate::store::{InstallResult, SnapshotStore};
use crate::update::{SnapshotUpdate, UpdateConfig};
use crate::{GeoIpDbConfig, GeoIpDbError, LookupError, SnapshotDecoder};

pub(crate) struct DbShared<D> {
    file: PathBuf,
    store: SnapshotStore<D>,
    open_event: EventSlot<PathBuf>,
    error_event: EventSlot<GeoIpDbError>,
    close_signal: CloseSignal,
}

impl<D> DbShared<D> {
    pub(crate) fn new(file: PathBuf) -> Self {
        DbShared {
            file,
            store: SnapshotStore::new(),
            open_event: EventSlot::new(),
            error_event: EventSlot::new(),
            close_signal: CloseSignal::new(),
        }
    }

    pub(crate) fn file(&self) -> &Path {
        &self.file
    }

    pub(crate) fn close_receiver(&self) -> watch::Receiver<()> {
        self.close_signal.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn is_loaded(&self) -> bool {
        self.store.load().is_some()
    }

    pub(crate) fn send_error(&self, e: GeoIpDbError) {
        if self.store.is_closed() {
            return;
        }
        if !self.error_event.send(e) {
            debug!("error event for {} dropped", self.file.display());
        }
    }

    pub(crate) fn close(&self) {
        if self.store.close() {
            self.open_event.close();
            self.error_event.close();
            self.close_signal.fire();
            info!("closed geoip database {}", self.file.display());
        }
    }
}

impl<D: SnapshotDecoder> DbShared<D> {
    fn install(&self, snapshot: LoadedSnapshot<D>) {
        match self.store.install(snapshot.decoder, snapshot.modified) {
            InstallResult::Installed => {
                info!(
                    "loaded geoip database {} modified at {}",
                    self.file.display(),
                    snapshot.modified
                );
                if !self.open_event.send(self.file.clone()) {
                    debug!("open event for {} dropped", self.file.display());
                }
            }
            InstallResult::Closed => {
                debug!(
                    "database {} closed, the new loaded snapshot is dropped",
                    self.file.display()
                );
            }
        }
    }

    /// Load the file again and make it the active snapshot.
    pub(crate) async fn reload(&self) -> Result<(), GeoIpDbError> {
        let snapshot = file::load_blocking::<D>(self.file.clone()).await?;
        self.install(snapshot);
        Ok(())
    }
}

/// A GeoIP database kept in sync with its snapshot file.
///
/// The snapshot file is watched, and loaded again whenever it is created or
/// modified. If opened from a url, the file is also refreshed in background.
///
/// The database is closed when dropped.
pub struct GeoIpDatabase<D: SnapshotDecoder> {
    shared: Arc<DbShared<D>>,
}

impl<D: SnapshotDecoder> GeoIpDatabase<D> {
    /// Open a local snapshot file.
    ///
    /// Fails if the file can't be loaded or watched.
    pub async fn open<P: AsRef<Path>>(file: P) -> Result<Self, GeoIpDbError> {
        GeoIpDbConfig::with_local_file(file.as_ref()).open().await
    }

    /// Open a snapshot published at `url`.
    ///
    /// The snapshot is cached at [`crate::default_cache_file`] and loaded in
    /// background, so lookups may fail with [`LookupError::Unavailable`] until
    /// the first download is installed.
    pub async fn open_url(
        url: &str,
        refresh_interval: Duration,
        max_retry_interval: Duration,
    ) -> Result<Self, GeoIpDbError> {
        let mut config = GeoIpDbConfig::with_url(url);
        config.set_refresh_interval(refresh_interval);
        config.set_max_retry_interval(max_retry_interval);
        config.open().await
    }

    pub(crate) async fn open_local(file: PathBuf, debounce: Duration) -> Result<Self, GeoIpDbError> {
        let shared = Arc::new(DbShared::new(file));
        let snapshot = file::load_blocking::<D>(shared.file.clone()).await?;
        shared.install(snapshot);

        let db = GeoIpDatabase { shared };
        crate::watch::spawn_watcher(db.shared.clone(), debounce).await?;
        Ok(db)
    }

    pub(crate) async fn open_remote(
        file: PathBuf,
        source: Arc<dyn SnapshotSource>,
        update: UpdateConfig,
        debounce: Duration,
    ) -> Result<Self, GeoIpDbError> {
        let shared = Arc::new(DbShared::new(file));
        match file::load_blocking::<D>(shared.file.clone()).await {
            Ok(snapshot) => shared.install(snapshot),
            Err(e) => debug!("no usable local copy yet: {e}"),
        }

        let db = GeoIpDatabase { shared };
        // arm the watcher first so that the first install is not missed
        crate::watch::spawn_watcher(db.shared.clone(), debounce).await?;
        SnapshotUpdate::new(update, db.shared.clone(), source).spawn_run();
        Ok(db)
    }

    /// Lookup the record for `ip` in the active snapshot.
    ///
    /// Errors from the decoder are returned as is.
    pub fn lookup<T: DeserializeOwned>(&self, ip: IpAddr) -> Result<T, LookupError<D::Error>> {
        match self.shared.store.load() {
            Some(db) => db.lookup(ip).map_err(LookupError::Decoder),
            None => Err(LookupError::Unavailable),
        }
    }

    /// The UTC modification time of the snapshot file in use, or `None` if no
    /// snapshot has ever been loaded.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.shared.store.last_updated()
    }

    pub fn file(&self) -> &Path {
        self.shared.file()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.store.is_closed()
    }

    /// Take the receiver of the open events, which carry the file path each
    /// time a snapshot is installed. Only the first call returns `Some`.
    ///
    /// This is a single slot channel: an event is dropped if the previous one
    /// has not been received yet.
    pub fn notify_open(&self) -> Option<mpsc::Receiver<PathBuf>> {
        self.shared.open_event.take_receiver()
    }

    /// Take the receiver of background errors. Only the first call returns
    /// `Some`. Like [`Self::notify_open`], errors are dropped if the previous
    /// one has not been received yet.
    pub fn notify_error(&self) -> Option<mpsc::Receiver<GeoIpDbError>> {
        self.shared.error_event.take_receiver()
    }

    /// `changed()` on the returned receiver completes with an error once the
    /// database is closed.
    pub fn notify_close(&self) -> watch::Receiver<()> {
        self.shared.close_receiver()
    }

    /// Stop all background tasks and release the active snapshot.
    ///
    /// Calling it more than once is fine.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl<D: SnapshotDecoder> Drop for GeoIpDatabase<D> {
    fn drop(&mut self) {
        self.shared.close();
    }
}
