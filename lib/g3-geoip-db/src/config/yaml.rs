/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use humanize_rs::ParseError;
use yaml_rust::{Yaml, yaml};

use super::{GeoIpDbConfig, SnapshotLocation};

fn normalize_key(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}

fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        let Yaml::String(key) = k else {
            return Err(anyhow!("key in hash should be string"));
        };
        f(key, v).context(format!("failed to parse value of key {key}"))?;
    }
    Ok(())
}

fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(value) => match humanize_rs::duration::parse(value) {
            Ok(v) => Ok(v),
            Err(ParseError::MissingUnit) => u64::from_str(value)
                .map(Duration::from_secs)
                .map_err(|_| anyhow!("invalid duration string {value}")),
            Err(e) => Err(anyhow!("invalid humanize duration string: {e}")),
        },
        Yaml::Integer(value) => u64::try_from(*value)
            .map(Duration::from_secs)
            .map_err(|_| anyhow!("negative duration value {value}")),
        _ => Err(anyhow!(
            "yaml value type for duration should be 'string' or 'integer'"
        )),
    }
}

fn as_path(v: &Yaml, conf_dir: &Path) -> anyhow::Result<PathBuf> {
    let Yaml::String(s) = v else {
        return Err(anyhow!("yaml value type for path should be 'string'"));
    };
    if s.is_empty() {
        return Err(anyhow!("empty path"));
    }
    let path = PathBuf::from(s);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(conf_dir.join(path))
    }
}

fn as_url(v: &Yaml) -> anyhow::Result<String> {
    let Yaml::String(s) = v else {
        return Err(anyhow!("yaml value type for url should be 'string'"));
    };
    if s.starts_with("http://") || s.starts_with("https://") {
        Ok(s.to_string())
    } else {
        Err(anyhow!("unsupported url {s}"))
    }
}

fn as_location(v: &Yaml, conf_dir: &Path) -> anyhow::Result<SnapshotLocation> {
    match as_url(v) {
        Ok(url) => Ok(SnapshotLocation::Url(url)),
        Err(_) => as_path(v, conf_dir).map(SnapshotLocation::File),
    }
}

impl GeoIpDbConfig {
    /// Parse the config from yaml, relative paths are resolved against
    /// `conf_dir`. A single string value is taken as the file path or url.
    pub fn parse_yaml(value: &Yaml, conf_dir: &Path) -> anyhow::Result<Self> {
        match value {
            Yaml::Hash(map) => {
                let mut location = None;
                let mut config =
                    GeoIpDbConfig::new(SnapshotLocation::File(crate::default_cache_file()));

                foreach_kv(map, |k, v| match normalize_key(k).as_str() {
                    "file" | "path" => {
                        location = Some(SnapshotLocation::File(as_path(v, conf_dir)?));
                        Ok(())
                    }
                    "url" => {
                        location = Some(SnapshotLocation::Url(as_url(v)?));
                        Ok(())
                    }
                    "cache_file" => {
                        config.set_cache_file(as_path(v, conf_dir)?);
                        Ok(())
                    }
                    "download_dir" => {
                        config.set_download_dir(as_path(v, conf_dir)?);
                        Ok(())
                    }
                    "refresh_interval" | "update_interval" => {
                        config.set_refresh_interval(as_duration(v)?);
                        Ok(())
                    }
                    "initial_retry_interval" => {
                        config.set_initial_retry_interval(as_duration(v)?);
                        Ok(())
                    }
                    "max_retry_interval" => {
                        config.set_max_retry_interval(as_duration(v)?);
                        Ok(())
                    }
                    "watch_debounce" => {
                        config.set_watch_debounce(as_duration(v)?);
                        Ok(())
                    }
                    "connect_timeout" => {
                        config.set_connect_timeout(as_duration(v)?);
                        Ok(())
                    }
                    "read_timeout" => {
                        config.set_read_timeout(as_duration(v)?);
                        Ok(())
                    }
                    _ => Err(anyhow!("invalid key {k}")),
                })?;

                let Some(location) = location else {
                    return Err(anyhow!("no file or url set"));
                };
                config.set_location(location);
                Ok(config)
            }
            Yaml::String(_) => {
                let location = as_location(value, conf_dir)?;
                Ok(GeoIpDbConfig::new(location))
            }
            _ => Err(anyhow!(
                "yaml type for 'geoip db config' should be 'map' or 'string'"
            )),
        }
    }
}
