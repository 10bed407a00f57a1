/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Url};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::SnapshotSource;

/// Snapshot published at a http(s) url.
pub struct HttpSnapshotSource {
    url: Url,
    client: Client,
}

impl HttpSnapshotSource {
    pub fn new(
        url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let url = Url::parse(url).map_err(|e| anyhow!("invalid url {url}: {e}"))?;
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(HttpSnapshotSource { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn content_length(&self) -> anyhow::Result<Option<u64>> {
        let rsp = self
            .client
            .head(self.url.clone())
            .send()
            .await
            .map_err(|e| anyhow!("HEAD {} failed: {e}", self.url))?;
        // the body of a HEAD response is always empty, so read the header directly
        let len = rsp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        Ok(len)
    }

    async fn fetch(&self, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> anyhow::Result<u64> {
        let mut rsp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| anyhow!("GET {} failed: {e}", self.url))?;
        let status = rsp.status();
        if !status.is_success() {
            return Err(anyhow!("GET {} got status {status}", self.url));
        }

        let mut total = 0u64;
        while let Some(chunk) = rsp
            .chunk()
            .await
            .map_err(|e| anyhow!("failed to read body from {}: {e}", self.url))?
        {
            writer
                .write_all(&chunk)
                .await
                .context("failed to write to local file")?;
            total += chunk.len() as u64;
        }
        Ok(total)
    }
}
