// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use lambdactl_app::{Credential, Filesystem, Instance, InstanceId, InstanceType, Offering, Region};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://cloud.lambdalabs.com/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    api_key: String,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                parsed.scheme()
            );
        }
        if api_key.trim().is_empty() {
            bail!("api.api_key must not be empty -- set it in the config or LAMBDA_API_KEY");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key.to_owned(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn list_instances(&self) -> Result<Vec<Instance>> {
        let envelope: DataEnvelope<Vec<Instance>> = self.get("instances", "instance list")?;
        Ok(envelope.data)
    }

    /// One offering per instance type and region that currently has capacity.
    pub fn instance_types(&self) -> Result<Vec<Offering>> {
        let envelope: DataEnvelope<BTreeMap<String, InstanceTypeEntry>> =
            self.get("instance-types", "instance types")?;
        Ok(flatten_offerings(envelope.data))
    }

    pub fn list_filesystems(&self) -> Result<Vec<Filesystem>> {
        let envelope: DataEnvelope<Vec<Filesystem>> = self.get("file-systems", "filesystems")?;
        Ok(envelope.data)
    }

    pub fn list_ssh_keys(&self) -> Result<Vec<Credential>> {
        let envelope: DataEnvelope<Vec<Credential>> = self.get("ssh-keys", "ssh keys")?;
        Ok(envelope.data)
    }

    pub fn launch_instances(
        &self,
        offering: &Offering,
        quantity: u32,
        ssh_key_names: &[String],
    ) -> Result<Vec<InstanceId>> {
        let request = LaunchRequest {
            region_name: &offering.region.name,
            instance_type_name: &offering.instance_type.name,
            ssh_key_names,
            quantity: quantity.max(1),
        };
        debug!(
            instance_type = request.instance_type_name,
            region = request.region_name,
            quantity = request.quantity,
            "launching instances"
        );

        let url = self.endpoint("instance-operations/launch");
        let envelope: DataEnvelope<LaunchResponse> =
            self.send(self.http.post(&url).json(&request), "launch response")?;
        Ok(envelope.data.instance_ids)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = self.endpoint(path);
        debug!(%url, "fetching {what}");
        self.send(self.http.get(&url), what)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let error = clean_error_response(status, &body);
            warn!(status = status.as_u16(), "request for {what} failed: {error}");
            return Err(error);
        }

        response.json().with_context(|| format!("decode {what}"))
    }
}

pub fn flatten_offerings(entries: BTreeMap<String, InstanceTypeEntry>) -> Vec<Offering> {
    entries
        .into_values()
        .flat_map(|entry| {
            let instance_type = entry.instance_type;
            entry
                .regions_with_capacity_available
                .into_iter()
                .map(move |region| Offering {
                    instance_type: instance_type.clone(),
                    region,
                })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceTypeEntry {
    pub instance_type: InstanceType,
    #[serde(default)]
    pub regions_with_capacity_available: Vec<Region>,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct LaunchRequest<'a> {
    region_name: &'a str,
    instance_type_name: &'a str,
    ssh_key_names: &'a [String],
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct LaunchResponse {
    #[serde(default)]
    instance_ids: Vec<InstanceId>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    suggestion: Option<String>,
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("request to {base_url} timed out -- raise api.timeout or retry");
    }
    anyhow!("cannot reach {base_url} -- check api.base_url and your network ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.message.is_empty()
    {
        let code = if error.code.is_empty() {
            status.as_u16().to_string()
        } else {
            error.code
        };
        return match error.suggestion.filter(|hint| !hint.is_empty()) {
            Some(hint) => anyhow!("server error ({code}): {} -- {hint}", error.message),
            None => anyhow!("server error ({code}): {}", error.message),
        };
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "server rejected the API key ({}) -- check api.api_key",
            status.as_u16()
        );
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return anyhow!("server error ({}): {trimmed}", status.as_u16());
    }

    anyhow!("server returned {}", status.as_u16())
}
