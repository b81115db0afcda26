//! Maghrib time from the Aladhan prayer-times API.
//!
//! `GET {endpoint}/{DD-MM-YYYY}?latitude=..&longitude=..&method=N` answers with
//! `{"code": 200, "data": {"timings": {"Maghrib": "18:07", ...}}}`. Times are
//! taken as local wall-clock times; a trailing zone annotation is dropped.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

use crate::common::constants::{ALADHAN_ENDPOINT, FETCH_TIMEOUT_SECS};
use crate::core::deadline::Deadline;
use crate::source::{DeadlineSource, Location, require_location};

#[derive(Debug, Deserialize)]
struct TimingsResponse {
    code: u16,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TimingsData {
    timings: Timings,
}

#[derive(Debug, Deserialize)]
struct Timings {
    #[serde(rename = "Maghrib")]
    maghrib: String,
}

pub struct AladhanSource {
    client: reqwest::blocking::Client,
    endpoint: String,
    method: u8,
}

impl AladhanSource {
    pub fn new(method: u8) -> Result<Self> {
        Self::with_endpoint(ALADHAN_ENDPOINT, method)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, method: u8) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(concat!("duskbell/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            method,
        })
    }

    pub fn url(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            date.format("%d-%m-%Y")
        )
    }
}

/// Extract the Maghrib time from a timings response body.
pub fn parse_response(body: &str) -> Result<Deadline> {
    let response: TimingsResponse =
        serde_json::from_str(body).context("Malformed timings response")?;
    if response.code != 200 {
        bail!(
            "Timings service answered {} ({})",
            response.code,
            response.status.as_deref().unwrap_or("no status")
        );
    }
    let data: TimingsData =
        serde_json::from_value(response.data).context("Timings response has no timings")?;
    Deadline::parse(&data.timings.maghrib)
        .with_context(|| format!("Unreadable Maghrib time '{}'", data.timings.maghrib))
}

impl DeadlineSource for AladhanSource {
    fn name(&self) -> &'static str {
        "aladhan"
    }

    fn fetch(&self, location: Option<Location>, date: NaiveDate) -> Result<Deadline> {
        let location = require_location(location, self.name())?;
        let body = self
            .client
            .get(self.url(date))
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("method", self.method.to_string()),
            ])
            .send()
            .context("Timings request failed")?
            .text()
            .context("Failed to read timings response")?;
        parse_response(&body)
    }
}
