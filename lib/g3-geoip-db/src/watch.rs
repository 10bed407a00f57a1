/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};

use crate::db::DbShared;
use crate::{GeoIpDbError, SnapshotDecoder};

pub(crate) struct SnapshotWatch<D> {
    shared: Arc<DbShared<D>>,
    target: PathBuf,
    debounce: Duration,
    event_receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    close_receiver: watch::Receiver<()>,
    _watcher: Option<RecommendedWatcher>,
}

/// Watch the directory of the database file, as the file itself is replaced
/// by rename, and reload the database on create or modify events of the file.
pub(crate) async fn spawn_watcher<D: SnapshotDecoder>(
    shared: Arc<DbShared<D>>,
    debounce: Duration,
) -> Result<(), GeoIpDbError> {
    let file = shared.file();
    let watch_err = |path: &Path, reason: String| GeoIpDbError::Watch {
        path: path.to_path_buf(),
        reason,
    };

    let dir = crate::remote::make_dir(file)
        .await
        .map_err(|e| watch_err(file, format!("unable to create directory: {e}")))?;
    let dir = tokio::fs::canonicalize(&dir)
        .await
        .map_err(|e| watch_err(&dir, format!("unable to resolve directory: {e}")))?;
    let Some(file_name) = file.file_name() else {
        return Err(watch_err(file, "no file name found".to_string()));
    };
    let target = dir.join(file_name);

    let (event_sender, event_receiver) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |r: notify::Result<Event>| {
        let _ = event_sender.send(r);
    })
    .map_err(|e| watch_err(&dir, format!("failed to create watcher: {e}")))?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| watch_err(&dir, e.to_string()))?;
    debug!("watching directory {} for {}", dir.display(), target.display());

    let close_receiver = shared.close_receiver();
    let w = SnapshotWatch {
        shared,
        target,
        debounce,
        event_receiver,
        close_receiver,
        _watcher: Some(watcher),
    };
    w.spawn_run();
    Ok(())
}

impl<D: SnapshotDecoder> SnapshotWatch<D> {
    #[cfg(test)]
    pub(crate) fn with_receiver(
        shared: Arc<DbShared<D>>,
        target: PathBuf,
        debounce: Duration,
        event_receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    ) -> Self {
        let close_receiver = shared.close_receiver();
        SnapshotWatch {
            shared,
            target,
            debounce,
            event_receiver,
            close_receiver,
            _watcher: None,
        }
    }

    pub(crate) fn spawn_run(self) {
        tokio::spawn(self.run());
    }

    fn is_target_changed(&self, r: notify::Result<Event>) -> bool {
        match r {
            Ok(ev) => match ev.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    ev.paths.iter().any(|p| p == &self.target)
                }
                _ => false,
            },
            Err(e) => {
                debug!("watch error for {}: {e}", self.target.display());
                false
            }
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let r = tokio::select! {
                biased;

                _ = self.close_receiver.changed() => break,
                r = self.event_receiver.recv() => r,
            };
            let Some(r) = r else {
                break;
            };
            let mut need_reload = self.is_target_changed(r);

            // a single file replacement emits a burst of events
            tokio::select! {
                biased;

                _ = self.close_receiver.changed() => break,
                _ = tokio::time::sleep(self.debounce) => {}
            }
            while let Ok(r) = self.event_receiver.try_recv() {
                need_reload |= self.is_target_changed(r);
            }

            if need_reload {
                if let Err(e) = self.shared.reload().await {
                    warn!("failed to reload {}: {e}", self.target.display());
                    self.shared.send_error(e);
                }
            }
        }
        debug!("stopped watching {}", self.target.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use serde::de::DeserializeOwned;

    static DECODED: AtomicUsize = AtomicUsize::new(0);

    struct Counting;

    impl SnapshotDecoder for Counting {
        type Error = std::io::Error;

        fn decode(_buf: Vec<u8>) -> Result<Self, Self::Error> {
            DECODED.fetch_add(1, Ordering::SeqCst);
            Ok(Counting)
        }

        fn lookup<T: DeserializeOwned>(&self, _ip: IpAddr) -> Result<T, Self::Error> {
            Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
        }
    }

    fn modify(path: &Path) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(path.to_path_buf()))
    }

    #[tokio::test]
    async fn coalesce_burst() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("db.gz");
        let mut enc = GzEncoder::new(std::fs::File::create(&file).unwrap(), Compression::fast());
        enc.write_all(b"data").unwrap();
        enc.finish().unwrap();

        let shared = Arc::new(DbShared::<Counting>::new(file.clone()));
        let (sender, receiver) = mpsc::unbounded_channel();
        let w = SnapshotWatch::with_receiver(
            shared.clone(),
            file.clone(),
            Duration::from_millis(200),
            receiver,
        );
        let task = tokio::spawn(w.run());

        sender.send(modify(&file)).unwrap();
        sender.send(modify(&file)).unwrap();
        sender.send(modify(&file)).unwrap();
        sender
            .send(Ok(Event::new(EventKind::Create(CreateKind::File))
                .add_path(dir.path().join("other.gz"))))
            .unwrap();
        sender
            .send(Ok(
                Event::new(EventKind::Remove(RemoveKind::File)).add_path(file.clone())
            ))
            .unwrap();
        sender.send(Err(notify::Error::generic("noise"))).unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(DECODED.load(Ordering::SeqCst), 1);
        assert!(shared.is_loaded());

        shared.close();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
