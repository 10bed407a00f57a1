/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum GeoIpDbError {
    #[error("failed to read database file {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid gzip stream in database file {}: {source}", .path.display())]
    Format { path: PathBuf, source: io::Error },
    #[error("failed to decode database file {}: {source}", .path.display())]
    Decode { path: PathBuf, source: BoxError },
    #[error("failed to watch directory {}: {reason}", .path.display())]
    Watch { path: PathBuf, reason: String },
    #[error("remote check failed: {0:#}")]
    Check(anyhow::Error),
    #[error("download failed: {0:#}")]
    Download(anyhow::Error),
    #[error("failed to install {} as {}: {source}", .from.display(), .to.display())]
    Install {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("background task failed: {0}")]
    Background(String),
    #[error("invalid config: {0:#}")]
    Config(anyhow::Error),
}

impl GeoIpDbError {
    pub fn brief(&self) -> &'static str {
        match self {
            GeoIpDbError::Io { .. } => "Io",
            GeoIpDbError::Format { .. } => "Format",
            GeoIpDbError::Decode { .. } => "Decode",
            GeoIpDbError::Watch { .. } => "Watch",
            GeoIpDbError::Check(_) => "Check",
            GeoIpDbError::Download(_) => "Download",
            GeoIpDbError::Install { .. } => "Install",
            GeoIpDbError::Background(_) => "Background",
            GeoIpDbError::Config(_) => "Config",
        }
    }
}

/// Error returned by a lookup on the database handle.
#[derive(Error, Debug)]
pub enum LookupError<E> {
    /// No snapshot has been installed yet, or the handle has been closed.
    #[error("no database available")]
    Unavailable,
    #[error("{0}")]
    Decoder(E),
}

impl<E> LookupError<E> {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LookupError::Unavailable)
    }
}
