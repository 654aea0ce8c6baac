//! Email header and content risk
//!
//! Stateless: nothing is appended to the history store. Sender-domain SPF
//! and DMARC presence come from a [`DomainRecordLookup`]; a failed or slow
//! lookup counts as the record being absent.

use crate::lookup::{has_record, DomainRecordLookup};
use crate::{ScoreResult, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::time::Duration;

/// Email evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Whether the tool is offered at all
    pub enabled: bool,

    /// DNS-over-HTTPS JSON endpoint
    pub doh_endpoint: String,

    /// Upper bound for each TXT lookup
    pub lookup_timeout_ms: u64,

    /// Lower-case phrases that mark phishing content
    pub keywords: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            doh_endpoint: "https://cloudflare-dns.com/dns-query".to_string(),
            lookup_timeout_ms: 2000,
            keywords: ["verify", "urgent", "password", "click", "wire transfer"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl EmailConfig {
    /// Lookup timeout as a `Duration`
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

/// `fakeEmailDetector` arguments
#[derive(Debug, Clone, Deserialize)]
pub struct EmailInput {
    /// From header, display name allowed
    pub from: String,
    /// Return-Path header
    pub return_path: Option<String>,
    /// Subject line
    pub subject: Option<String>,
    /// Plain-text body
    pub body: Option<String>,
    /// Links found in the message
    pub links: Option<Vec<String>>,
}

/// Sender-domain authentication records found for the message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainAuth {
    /// Sender domain publishes an SPF record
    pub has_spf: bool,
    /// Sender domain publishes a DMARC record
    pub has_dmarc: bool,
}

/// Domain part of an address: text after `@` up to whitespace or `>`
pub fn domain_of(address: &str) -> Option<String> {
    address.match_indices('@').find_map(|(at, _)| {
        let domain: String = address[at + 1..]
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != '>')
            .collect();
        (!domain.is_empty()).then(|| domain.to_lowercase())
    })
}

/// Score an email given its sender-domain records
pub fn evaluate(input: &EmailInput, auth: DomainAuth, config: &EmailConfig) -> ScoreResult {
    let from_domain = domain_of(&input.from);
    let mut points = 0u32;
    let mut reasons = Vec::new();

    if !auth.has_spf {
        points += 10;
        reasons.push("Missing SPF record".to_string());
    }
    if !auth.has_dmarc {
        points += 10;
        reasons.push("Missing DMARC record".to_string());
    }

    if let (Some(rp_domain), Some(from_domain)) = (input.return_path.as_deref().and_then(domain_of), &from_domain) {
        if &rp_domain != from_domain {
            points += 20;
            reasons.push("Return-Path mismatch".to_string());
        }
    }

    let text = format!(
        "{} {}",
        input.subject.as_deref().unwrap_or(""),
        input.body.as_deref().unwrap_or("")
    )
    .to_lowercase();
    let found: Vec<&str> = config
        .keywords
        .iter()
        .map(String::as_str)
        .filter(|k| text.contains(k))
        .collect();
    if !found.is_empty() {
        points += 20;
        reasons.push(format!("Keywords: {}", found.join(", ")));
    }

    if let (Some(links), Some(from_domain)) = (&input.links, &from_domain) {
        let bad: Vec<&str> = links
            .iter()
            .map(String::as_str)
            .filter(|l| !l.contains(from_domain.as_str()))
            .collect();
        if !bad.is_empty() {
            points += 20;
            reasons.push(format!("Suspicious links: {}", bad.join(", ")));
        }
    }

    let mut result = ScoreResult::from_points(points, reasons);
    // any red flag is reportable, not only scores past the threshold
    result.suspicious = result.suspicious || !result.reasons.is_empty();
    result
}

/// Resolve SPF and DMARC presence concurrently, each bounded by the timeout
pub async fn resolve_auth(lookup: &dyn DomainRecordLookup, from: &str, config: &EmailConfig) -> DomainAuth {
    let Some(domain) = domain_of(from) else {
        return DomainAuth::default();
    };
    let dmarc_name = format!("_dmarc.{}", domain);
    let timeout = config.lookup_timeout();

    let (has_spf, has_dmarc) = tokio::join!(
        has_record(lookup, &domain, "v=spf1", timeout),
        has_record(lookup, &dmarc_name, "v=DMARC1", timeout),
    );
    DomainAuth { has_spf, has_dmarc }
}

pub(crate) async fn run(lookup: &dyn DomainRecordLookup, config: &EmailConfig, input: EmailInput) -> ToolOutput {
    let auth = resolve_auth(lookup, &input.from, config).await;
    let result = evaluate(&input, auth, config);

    tracing::debug!(
        from = %input.from,
        score = result.score.score(),
        has_spf = auth.has_spf,
        has_dmarc = auth.has_dmarc,
        "Email evaluated"
    );

    let summary = if result.suspicious {
        format!(
            "⚠ Likely fraudulent email from {} (score {}/100). Issues: {}",
            input.from,
            result.score,
            result.reasons.join("; ")
        )
    } else {
        format!("✅ Email from {} looks safe (score {}/100).", input.from, result.score)
    };

    let recommendation = if result.suspicious {
        "Action: Flag or block this email."
    } else {
        crate::NO_ACTION
    };

    let mut details = Map::new();
    details.insert("from".into(), json!(input.from));
    details.insert("from_domain".into(), json!(domain_of(&input.from)));
    details.insert("has_spf".into(), json!(auth.has_spf));
    details.insert("has_dmarc".into(), json!(auth.has_dmarc));
    details.insert("score".into(), json!(result.score.score()));
    details.insert("severity".into(), json!(result.severity.as_str()));
    details.insert("reasons".into(), json!(result.reasons));

    ToolOutput {
        summary,
        recommendation: recommendation.to_string(),
        details: Some(details),
    }
}
