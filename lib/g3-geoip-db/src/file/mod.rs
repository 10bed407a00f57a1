/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::bufread::GzDecoder;

use crate::{GeoIpDbError, SnapshotDecoder};

pub struct LoadedSnapshot<D> {
    pub decoder: D,
    pub modified: DateTime<Utc>,
}

pub fn load<D: SnapshotDecoder>(file: &Path) -> Result<LoadedSnapshot<D>, GeoIpDbError> {
    let io_err = |source| GeoIpDbError::Io {
        path: file.to_path_buf(),
        source,
    };

    let f = File::open(file).map_err(io_err)?;
    let buf = read_gzip(f, file)?;
    let decoder = D::decode(buf).map_err(|e| GeoIpDbError::Decode {
        path: file.to_path_buf(),
        source: Box::new(e),
    })?;

    let modified = std::fs::metadata(file)
        .and_then(|m| m.modified())
        .map_err(io_err)?;
    Ok(LoadedSnapshot {
        decoder,
        modified: DateTime::<Utc>::from(modified),
    })
}

pub(crate) async fn load_blocking<D: SnapshotDecoder>(
    file: PathBuf,
) -> Result<LoadedSnapshot<D>, GeoIpDbError> {
    tokio::task::spawn_blocking(move || load(&file))
        .await
        .map_err(|e| GeoIpDbError::Background(format!("snapshot load task failed: {e}")))?
}

fn read_gzip<R: Read>(stream: R, file: &Path) -> Result<Vec<u8>, GeoIpDbError> {
    let mut gz = GzDecoder::new(BufReader::new(stream));
    let mut buf = Vec::new();
    gz.read_to_end(&mut buf).map_err(|e| GeoIpDbError::Format {
        path: file.to_path_buf(),
        source: e,
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::IpAddr;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use serde::de::DeserializeOwned;

    struct Lines(Vec<String>);

    impl SnapshotDecoder for Lines {
        type Error = std::io::Error;

        fn decode(buf: Vec<u8>) -> Result<Self, Self::Error> {
            let s = String::from_utf8(buf)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            if s.is_empty() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "empty database",
                ));
            }
            Ok(Lines(s.lines().map(|l| l.to_string()).collect()))
        }

        fn lookup<T: DeserializeOwned>(&self, _ip: IpAddr) -> Result<T, Self::Error> {
            Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
        }
    }

    fn write_gz(path: &Path, data: &[u8]) {
        let f = File::create(path).unwrap();
        let mut enc = GzEncoder::new(f, Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn load_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.gz");
        write_gz(&path, b"a\nb\n");

        let snapshot = load::<Lines>(&path).unwrap();
        assert_eq!(snapshot.decoder.0, vec!["a", "b"]);
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(snapshot.modified, DateTime::<Utc>::from(mtime));
    }

    #[test]
    fn load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let e = load::<Lines>(&dir.path().join("none.gz"))
            .err()
            .unwrap();
        assert_eq!(e.brief(), "Io");
    }

    #[test]
    fn load_not_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.gz");
        std::fs::write(&path, b"plain text").unwrap();
        let e = load::<Lines>(&path).err().unwrap();
        assert_eq!(e.brief(), "Format");
    }

    #[test]
    fn load_decode_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.gz");
        write_gz(&path, b"");
        let e = load::<Lines>(&path).err().unwrap();
        assert_eq!(e.brief(), "Decode");
    }
}
