/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::db::DbShared;
use crate::remote::{self, SnapshotSource};
use crate::{GeoIpDbError, SnapshotDecoder};

mod backoff;
use backoff::RetryBackoff;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UpdateConfig {
    pub(crate) refresh_interval: Duration,
    pub(crate) initial_retry_interval: Duration,
    pub(crate) max_retry_interval: Duration,
    pub(crate) download_dir: PathBuf,
}

pub(crate) struct SnapshotUpdate<D> {
    config: UpdateConfig,
    shared: Arc<DbShared<D>>,
    source: Arc<dyn SnapshotSource>,
    close_receiver: watch::Receiver<()>,
}

impl<D: SnapshotDecoder> SnapshotUpdate<D> {
    pub(crate) fn new(
        config: UpdateConfig,
        shared: Arc<DbShared<D>>,
        source: Arc<dyn SnapshotSource>,
    ) -> Self {
        let close_receiver = shared.close_receiver();
        SnapshotUpdate {
            config,
            shared,
            source,
            close_receiver,
        }
    }

    pub(crate) fn spawn_run(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        let mut backoff = RetryBackoff::new(
            self.config.refresh_interval,
            self.config.initial_retry_interval,
            self.config.max_retry_interval,
        );

        loop {
            // network io is not interrupted, the close signal is checked after it
            let wait = match self.run_update().await {
                Ok(_) => backoff.succeeded(),
                Err(e) => {
                    let wait = backoff.failed();
                    warn!("database update failed: {e}, retry in {wait:?}");
                    self.shared.send_error(e);
                    wait
                }
            };

            tokio::select! {
                biased;

                _ = self.close_receiver.changed() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        debug!("stopped updating {}", self.shared.file().display());
    }

    async fn run_update(&self) -> Result<(), GeoIpDbError> {
        let file = self.shared.file();
        if !remote::need_update(self.source.as_ref(), file).await? {
            debug!("database {} is up to date", file.display());
            return Ok(());
        }

        let tmp_file = remote::download(self.source.as_ref(), &self.config.download_dir).await?;
        remote::install(&tmp_file, file).await?;
        info!("installed new database file {}", file.display());
        Ok(())
    }
}
