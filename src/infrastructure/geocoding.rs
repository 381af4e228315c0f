// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::config::settings::GeocodingSettings;
use crate::utils::retry_policy::{retry, RetryPolicy};

/// 地理编码得到的行政区划信息
#[derive(Debug, Clone, Default)]
pub struct AddressLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeRecord>,
}

#[derive(Debug, Deserialize)]
struct GeocodeRecord {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    postcode: Option<String>,
}

/// 地址地理编码客户端
///
/// 把页面上提取到的地址文本解析成 city/state/postcode 派生字段。
/// 单次失败按固定间隔重试，彻底失败由调用方记为字段级错误。
#[derive(Debug, Clone)]
pub struct AddressGeocoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    policy: RetryPolicy,
}

impl AddressGeocoder {
    pub fn new(settings: &GeocodingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            policy: RetryPolicy::geocode(),
        })
    }

    /// 按地址文本解析行政区划
    pub async fn lookup(&self, address: &str) -> Result<AddressLocation> {
        let op = format!("geocode[{}]", address);
        retry(&self.policy, &op, || async { self.lookup_once(address).await }).await
    }

    async fn lookup_once(&self, address: &str) -> Result<AddressLocation> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("text", address),
                ("format", "json"),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Geocode request failed")?
            .error_for_status()
            .context("Geocode service returned error status")?;

        let body: GeocodeResponse = response
            .json()
            .await
            .context("Failed to parse geocode response")?;
        let record = body.results.into_iter().next().unwrap_or(GeocodeRecord {
            city: None,
            state: None,
            postcode: None,
        });
        debug!(
            address = %address,
            city = ?record.city,
            "Address geocode resolved"
        );
        Ok(AddressLocation {
            city: record.city,
            state: record.state,
            postcode: record.postcode,
        })
    }
}
