//! Exist.io API v2 client.
//!
//! Exist reports row-level problems inline (`failed`, `detail`) instead of
//! failing the whole request. Those are logged; only `not_found` on acquire
//! is acted upon (the attribute gets created).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use super::{
    http_client, join_url, AttributeValue, TrackingClient, MAX_OBJECTS_PER_REQUEST,
    MAX_VALUES_RANGE_DAYS,
};
use crate::config::ExistioConfig;
use crate::error::{Error, Result};

const SERVICE: &str = "existio";

/// Trends page of custom tags; also marks link comments for cleanup
pub const TAG_URL_BASE: &str = "https://exist.io/data/trends/custom/";

/// Fragment identifying a link comment
pub const TAG_URL_FRAGMENT: &str = "exist.io/data/trends/custom";

/// Exist value type for booleans, the only one allowed for custom tags
const VALUE_TYPE_BOOLEAN: u8 = 7;

/// Public trends page of `tag`.
pub fn tag_url(tag: &str) -> String {
    format!("{TAG_URL_BASE}{tag}")
}

#[derive(Debug, Deserialize)]
struct ValuesPage {
    #[serde(default)]
    results: Vec<ValueRow>,
}

#[derive(Debug, Deserialize)]
struct ValueRow {
    date: NaiveDate,
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FailedRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    error_code: String,
}

/// HTTP client for Exist.io
#[derive(Debug, Clone)]
pub struct ExistClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ExistClient {
    pub fn new(config: &ExistioConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: config.api_url.clone(),
            token: config.api_key.clone(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder, path: &str) -> Result<Value> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "existio response");
        let text = response.text().await?;

        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|_| Error::Api {
                service: SERVICE,
                status: status.as_u16(),
                message: text.clone(),
            })?
        };

        let detail = body.get("detail").filter(|detail| !detail.is_null());
        if let Some(detail) = detail {
            tracing::error!(path, %detail, "existio request reported detail");
        }
        let failed = body
            .get("failed")
            .and_then(Value::as_array)
            .filter(|rows| !rows.is_empty());
        if let Some(failed) = failed {
            tracing::error!(path, failed = %serde_json::Value::Array(failed.clone()), "existio rows failed");
        }

        if !status.is_success() && body.get("failed").is_none() {
            let message = detail
                .map(|detail| detail.as_str().map(str::to_string).unwrap_or_else(|| detail.to_string()))
                .unwrap_or(text);
            return Err(Error::Api {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = join_url(&self.base_url, path);
        tracing::debug!(method = "GET", %url, "existio request");
        self.send(self.http.get(&url).query(query), path).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = join_url(&self.base_url, path);
        tracing::debug!(method = "POST", %url, "existio request");
        self.send(self.http.post(&url).json(body), path).await
    }

    /// Post `names` in chunks as `[{"name": ...}]`, collecting failed rows.
    async fn post_names(&self, path: &str, names: &[String]) -> Result<Vec<FailedRow>> {
        let mut failed = Vec::new();
        for chunk in names.chunks(MAX_OBJECTS_PER_REQUEST) {
            let body: Vec<Value> = chunk
                .iter()
                .map(|name| serde_json::json!({ "name": name }))
                .collect();
            let result = self.post(path, &Value::Array(body)).await?;
            failed.extend(failed_rows(&result));
        }
        Ok(failed)
    }
}

fn failed_rows(body: &Value) -> Vec<FailedRow> {
    body.get("failed")
        .cloned()
        .and_then(|failed| serde_json::from_value(failed).ok())
        .unwrap_or_default()
}

fn int_value(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|v| v as i64))
        .or_else(|| value.as_bool().map(i64::from))
}

#[async_trait]
impl TrackingClient for ExistClient {
    #[tracing::instrument(skip(self), fields(service = SERVICE))]
    async fn values(
        &self,
        attribute: &str,
        date_min: NaiveDate,
        date_max: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, i64>> {
        if (date_max - date_min).num_days() > MAX_VALUES_RANGE_DAYS {
            return Err(Error::InvalidArgument(format!(
                "date_max - date_min must be at most {MAX_VALUES_RANGE_DAYS} days"
            )));
        }
        let query = [
            ("attribute", attribute.to_string()),
            ("limit", MAX_VALUES_RANGE_DAYS.to_string()),
            ("date_min", date_min.format("%Y-%m-%d").to_string()),
            ("date_max", date_max.format("%Y-%m-%d").to_string()),
        ];
        let body = self.get("attributes/values/", &query).await?;
        let page: ValuesPage = serde_json::from_value(body)?;
        Ok(page
            .results
            .into_iter()
            .filter_map(|row| {
                let value = row.value.as_ref().and_then(int_value)?;
                Some((row.date, value))
            })
            .collect())
    }

    async fn acquire(&self, names: &[String]) -> Result<()> {
        tracing::debug!(count = names.len(), ?names, "acquire tags");
        let failed = self.post_names("attributes/acquire/", names).await?;
        let missing: Vec<String> = failed
            .into_iter()
            .filter(|row| row.error_code == "not_found" && !row.name.is_empty())
            .map(|row| row.name)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = missing.len(), ?missing, "creating tags");
        self.create(&missing).await
    }

    async fn release(&self, names: &[String]) -> Result<()> {
        tracing::debug!(count = names.len(), ?names, "release tags");
        self.post_names("attributes/release/", names).await?;
        Ok(())
    }

    async fn create(&self, names: &[String]) -> Result<()> {
        for chunk in names.chunks(MAX_OBJECTS_PER_REQUEST) {
            let body: Vec<Value> = chunk
                .iter()
                .map(|name| {
                    serde_json::json!({
                        "name": name,
                        "label": name.replace('_', " "),
                        "group": "custom",
                        "manual": true,
                        "value_type": VALUE_TYPE_BOOLEAN,
                    })
                })
                .collect();
            self.post("attributes/create/", &Value::Array(body)).await?;
        }
        Ok(())
    }

    async fn update(&self, values: &[AttributeValue]) -> Result<()> {
        let mut names: Vec<String> = values.iter().map(|value| value.name.clone()).collect();
        names.sort();
        names.dedup();
        self.acquire(&names).await?;
        for chunk in values.chunks(MAX_OBJECTS_PER_REQUEST) {
            let body = serde_json::to_value(chunk)?;
            self.post("attributes/update/", &body).await?;
        }
        Ok(())
    }
}
