/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::GeoIpDbError;

mod http;
pub use http::HttpSnapshotSource;

mod install;
pub use install::install;
pub(crate) use install::make_dir;

/// Where the published snapshot lives.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Metadata only request, returns the advertised content length if any.
    async fn content_length(&self) -> anyhow::Result<Option<u64>>;

    /// Stream the full snapshot into `writer`, returns the number of bytes copied.
    async fn fetch(&self, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> anyhow::Result<u64>;
}

/// Check whether the local snapshot differs from the remote one.
///
/// A missing local file, or a remote length that is absent or not equal to the
/// local size, means an update is needed.
pub async fn need_update(
    source: &dyn SnapshotSource,
    local: &Path,
) -> Result<bool, GeoIpDbError> {
    let local_size = match tokio::fs::metadata(local).await {
        Ok(m) => m.len(),
        Err(_) => return Ok(true),
    };
    let remote_size = source
        .content_length()
        .await
        .map_err(GeoIpDbError::Check)?;
    match remote_size {
        Some(size) if size == local_size => Ok(false),
        Some(size) => {
            debug!("remote size {size} differs from local size {local_size}");
            Ok(true)
        }
        None => {
            debug!("no usable content length from remote, force update");
            Ok(true)
        }
    }
}

pub(crate) fn temp_file_name(dir: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    dir.join(format!("_g3-geoip.{nanos}.db.gz"))
}

/// Download the snapshot into a new temp file inside `dir`.
///
/// The temp file is removed if the download fails.
pub async fn download(source: &dyn SnapshotSource, dir: &Path) -> Result<PathBuf, GeoIpDbError> {
    let tmp_file = temp_file_name(dir);
    match download_to(source, &tmp_file).await {
        Ok(size) => {
            debug!("downloaded {size} bytes to {}", tmp_file.display());
            Ok(tmp_file)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp_file).await;
            Err(GeoIpDbError::Download(e))
        }
    }
}

async fn download_to(source: &dyn SnapshotSource, tmp_file: &Path) -> anyhow::Result<u64> {
    let mut f = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp_file)
        .await
        .map_err(|e| anyhow!("failed to create temp file {}: {e}", tmp_file.display()))?;
    let size = source.fetch(&mut f).await?;
    f.flush()
        .await
        .context("failed to flush temp file")?;
    f.sync_all()
        .await
        .context("failed to sync temp file")?;
    Ok(size)
}
