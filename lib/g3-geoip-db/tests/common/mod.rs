/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

#![allow(dead_code)]

use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::runtime::{Builder, Runtime};

use g3_geoip_db::SnapshotDecoder;
use g3_geoip_db::remote::SnapshotSource;

/// Records keyed by the textual ip address, stored as a json object.
pub struct JsonDb(Map<String, Value>);

impl SnapshotDecoder for JsonDb {
    type Error = serde_json::Error;

    fn decode(buf: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&buf).map(JsonDb)
    }

    fn lookup<T: DeserializeOwned>(&self, ip: IpAddr) -> Result<T, Self::Error> {
        let v = self.0.get(&ip.to_string()).cloned().unwrap_or(Value::Null);
        T::deserialize(v)
    }
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct Location {
    pub country: String,
}

pub fn runtime() -> Runtime {
    Builder::new_current_thread().enable_all().build().unwrap()
}

pub fn gzip_json(json: &str) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(json.as_bytes()).unwrap();
    enc.finish().unwrap()
}

/// Replace `file` by rename, the way a new snapshot gets installed.
pub fn replace_file(file: &Path, data: &[u8]) {
    let tmp = file.with_extension("tmp");
    std::fs::write(&tmp, data).unwrap();
    std::fs::rename(&tmp, file).unwrap();
}

pub async fn recv_timeout<T>(r: &mut tokio::sync::mpsc::Receiver<T>, secs: u64) -> Option<T> {
    tokio::time::timeout(Duration::from_secs(secs), r.recv())
        .await
        .ok()
        .flatten()
}

pub struct FakeSource {
    body: Vec<u8>,
    fail_check: bool,
    heads: AtomicUsize,
    gets: AtomicUsize,
}

impl FakeSource {
    pub fn new(body: Vec<u8>) -> Self {
        FakeSource {
            body,
            fail_check: false,
            heads: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        FakeSource {
            body: Vec::new(),
            fail_check: true,
            heads: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    pub fn heads(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    async fn content_length(&self) -> anyhow::Result<Option<u64>> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        if self.fail_check {
            return Err(anyhow!("connection refused"));
        }
        Ok(Some(self.body.len() as u64))
    }

    async fn fetch(&self, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> anyhow::Result<u64> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_check {
            return Err(anyhow!("connection refused"));
        }
        writer.write_all(&self.body).await?;
        Ok(self.body.len() as u64)
    }
}
