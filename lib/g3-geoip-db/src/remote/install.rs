/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::GeoIpDbError;

pub(crate) fn backup_path(file: &Path) -> PathBuf {
    let mut s = OsString::from(file.as_os_str());
    s.push(".bak");
    PathBuf::from(s)
}

pub(crate) async fn make_dir(file: &Path) -> std::io::Result<PathBuf> {
    let dir = match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    match tokio::fs::metadata(&dir).await {
        Ok(m) if m.is_dir() => {}
        _ => tokio::fs::create_dir_all(&dir).await?,
    }
    Ok(dir)
}

/// Move the downloaded `tmp_file` to `file`.
///
/// The existing file is moved to `<file>.bak` first, and moved back if the
/// final rename fails. The temp file is always gone when an error is returned.
pub async fn install(tmp_file: &Path, file: &Path) -> Result<(), GeoIpDbError> {
    let bak_file = backup_path(file);
    let backed_up = match tokio::fs::rename(file, &bak_file).await {
        Ok(_) => true,
        Err(e) => {
            debug!("no backup made for {}: {e}", file.display());
            false
        }
    };

    let r = match make_dir(file).await {
        Ok(_) => tokio::fs::rename(tmp_file, file).await,
        Err(e) => Err(e),
    };
    match r {
        Ok(_) => Ok(()),
        Err(e) => {
            let _ = tokio::fs::remove_file(tmp_file).await;
            if backed_up {
                if let Err(e) = tokio::fs::rename(&bak_file, file).await {
                    warn!(
                        "failed to restore {} from {}: {e}",
                        file.display(),
                        bak_file.display()
                    );
                }
            }
            Err(GeoIpDbError::Install {
                from: tmp_file.to_path_buf(),
                to: file.to_path_buf(),
                source: e,
            })
        }
    }
}
