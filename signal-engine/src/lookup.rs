//! Domain TXT record lookups used by the email evaluator
//!
//! Lookups are best-effort: [`has_record`] turns any failure or timeout
//! into "record absent", which the email evaluator scores as negative
//! evidence.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// DNS TXT record type
const TXT_RECORD_TYPE: u16 = 16;

/// Resolves TXT records for a domain name
#[async_trait]
pub trait DomainRecordLookup: Send + Sync {
    /// TXT record strings for `name`; each record's segments are joined
    async fn txt_records(&self, name: &str) -> Result<Vec<String>>;
}

/// Whether any TXT record of `name` contains `marker`
///
/// Bounded by `timeout`. Lookup failures and timeouts yield `false`.
pub async fn has_record(
    lookup: &dyn DomainRecordLookup,
    name: &str,
    marker: &str,
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, lookup.txt_records(name)).await {
        Ok(Ok(records)) => records.iter().any(|r| r.contains(marker)),
        Ok(Err(e)) => {
            tracing::warn!(name = %name, error = %e, "TXT lookup failed, treating record as absent");
            false
        }
        Err(_) => {
            tracing::warn!(name = %name, timeout_ms = timeout.as_millis() as u64, "TXT lookup timed out, treating record as absent");
            false
        }
    }
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// DNS-over-HTTPS lookup using the JSON API (`application/dns-json`)
#[derive(Clone)]
pub struct DohRecordLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl DohRecordLookup {
    /// Create lookup against `endpoint`, e.g. `https://cloudflare-dns.com/dns-query`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl DomainRecordLookup for DohRecordLookup {
    async fn txt_records(&self, name: &str) -> Result<Vec<String>> {
        let response: DohResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("name", name), ("type", "TXT")])
            .header("accept", "application/dns-json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // NXDOMAIN and friends: no records rather than an error
        if response.status != 0 {
            return Ok(Vec::new());
        }

        Ok(response
            .answer
            .into_iter()
            .filter(|a| a.record_type == TXT_RECORD_TYPE)
            .map(|a| a.data.replace('"', ""))
            .collect())
    }
}

/// Fixed in-memory records, for offline deployments and tests
#[derive(Debug, Clone, Default)]
pub struct StaticRecordLookup {
    records: HashMap<String, Vec<String>>,
    failing: bool,
}

impl StaticRecordLookup {
    /// Lookup with no records
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup whose every call fails
    pub fn failing() -> Self {
        Self {
            records: HashMap::new(),
            failing: true,
        }
    }

    /// Add a TXT record for `name`
    pub fn with_record(mut self, name: &str, record: &str) -> Self {
        self.records
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(record.to_string());
        self
    }
}

#[async_trait]
impl DomainRecordLookup for StaticRecordLookup {
    async fn txt_records(&self, name: &str) -> Result<Vec<String>> {
        if self.failing {
            return Err(Error::Lookup(format!("no resolver for {}", name)));
        }
        Ok(self
            .records
            .get(&name.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}
