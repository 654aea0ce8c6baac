//! Static tool table
//!
//! Each tool is a closed [`ToolKind`] variant with its name, descriptive
//! text and field contract. Dispatch is a name lookup in [`TOOLS`].

use crate::{Error, Result};
use serde_json::{json, Map, Value};

/// Registered tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Request rate per IP
    IpVelocity,
    /// Geo consistency per device
    GeoDevice,
    /// Login attempt velocity per user
    UserBehavior,
    /// Transaction amount anomalies per user
    AmountTransaction,
    /// IP/geo consistency per session
    SessionConsistency,
    /// Email header and content risk
    FakeEmailDetector,
}

/// Primitive type of an input field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// JSON string
    String,
    /// Any JSON number
    Number,
    /// Whole JSON number
    Integer,
    /// JSON boolean
    Boolean,
    /// Array of JSON strings
    StringArray,
}

impl FieldType {
    fn schema(&self) -> Value {
        match self {
            FieldType::String => json!({"type": "string"}),
            FieldType::Number => json!({"type": "number"}),
            FieldType::Integer => json!({"type": "integer"}),
            FieldType::Boolean => json!({"type": "boolean"}),
            FieldType::StringArray => json!({"type": "array", "items": {"type": "string"}}),
        }
    }
}

/// One input field of a tool
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Wire name
    pub name: &'static str,
    /// Primitive type
    pub field_type: FieldType,
    /// Whether the field must be present
    pub required: bool,
    /// Human-readable description
    pub description: &'static str,
}

const fn required(name: &'static str, field_type: FieldType, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required: true,
        description,
    }
}

const fn optional(name: &'static str, field_type: FieldType, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        field_type,
        required: false,
        description,
    }
}

const TIMESTAMP: FieldSpec = optional("timestamp_ms", FieldType::Integer, "Event time in Unix milliseconds (default: now)");

/// A tool's name, description and input contract
#[derive(Debug, Clone, Copy)]
pub struct ToolDescriptor {
    /// Variant dispatched to
    pub kind: ToolKind,
    /// Wire name
    pub name: &'static str,
    /// Display title
    pub title: &'static str,
    /// What the tool detects
    pub description: &'static str,
    /// Input contract
    pub fields: &'static [FieldSpec],
}

impl ToolDescriptor {
    /// JSON Schema of the input contract
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in self.fields {
            let mut schema = field.field_type.schema();
            schema["description"] = json!(field.description);
            properties.insert(field.name.to_string(), schema);
        }
        let required: Vec<&str> = self.fields.iter().filter(|f| f.required).map(|f| f.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// MCP `tools/list` entry
    pub fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "title": self.title,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }
}

/// Every tool the engine can run
pub static TOOLS: &[ToolDescriptor] = &[
    ToolDescriptor {
        kind: ToolKind::IpVelocity,
        name: "ipVelocity",
        title: "IP Velocity Check",
        description: "Detects too many requests from the same IP in a short period",
        fields: &[
            required("remote_address", FieldType::String, "Client IP address"),
            TIMESTAMP,
            optional("window_seconds", FieldType::Integer, "Trailing window in seconds (default 90)"),
        ],
    },
    ToolDescriptor {
        kind: ToolKind::GeoDevice,
        name: "geoDevice",
        title: "Geo Device Check",
        description: "Flags and blocks devices logging in from multiple locations or high-risk regions.",
        fields: &[
            required("device_id", FieldType::String, "Device identifier"),
            required("remote_address", FieldType::String, "Client IP address"),
            required("geo", FieldType::String, "Country or region code"),
            TIMESTAMP,
            optional("max_history", FieldType::Integer, "Logins kept per device (default 50)"),
        ],
    },
    ToolDescriptor {
        kind: ToolKind::UserBehavior,
        name: "userBehavior",
        title: "User Behavior Check",
        description: "Detects suspicious login attempts and abnormal transaction patterns.",
        fields: &[
            required("userId", FieldType::String, "User identifier"),
            required("passwordAttempt", FieldType::String, "Password attempted; only a fingerprint is kept"),
            required("successfulLogin", FieldType::Boolean, "Whether the login succeeded"),
            optional("transactionsLastDay", FieldType::Integer, "Transactions made in the last day"),
            TIMESTAMP,
            optional("window_seconds", FieldType::Integer, "Trailing window in seconds (default 3600)"),
        ],
    },
    ToolDescriptor {
        kind: ToolKind::AmountTransaction,
        name: "amountTransaction",
        title: "Transaction Amount Analyzer",
        description: "Flags unusually large or inconsistent transaction amounts compared to user's past history.",
        fields: &[
            required("user_id", FieldType::String, "User identifier"),
            required("transaction_id", FieldType::String, "Transaction identifier"),
            required("amount", FieldType::Number, "Transaction amount"),
            optional("currency", FieldType::String, "Currency code (default USD)"),
            TIMESTAMP,
            optional("avg_window", FieldType::Integer, "Transactions used for the average (default 20)"),
            optional("high_risk_threshold", FieldType::Number, "Amount always flagged (default 10000)"),
        ],
    },
    ToolDescriptor {
        kind: ToolKind::SessionConsistency,
        name: "sessionConsistency",
        title: "Session Consistency Analyzer",
        description: "Tracks session history (IPs, timestamps, geos if provided) and computes an anomaly score and recommendation.",
        fields: &[
            required("session_id", FieldType::String, "Session identifier"),
            required("ip", FieldType::String, "Client IP address"),
            optional("geo", FieldType::String, "Country or region code"),
            TIMESTAMP,
            optional("max_history", FieldType::Integer, "Observations kept per session (default 50)"),
        ],
    },
    ToolDescriptor {
        kind: ToolKind::FakeEmailDetector,
        name: "fakeEmailDetector",
        title: "Fake Email Detector",
        description: "Detects potentially fake or phishing emails by checking headers, domains, and suspicious content.",
        fields: &[
            required("from", FieldType::String, "From header"),
            optional("return_path", FieldType::String, "Return-Path header"),
            optional("subject", FieldType::String, "Subject line"),
            optional("body", FieldType::String, "Message body"),
            optional("links", FieldType::StringArray, "Links found in the message"),
        ],
    },
];

/// Name lookup over [`TOOLS`]
pub struct ToolRegistry;

impl ToolRegistry {
    /// Find a tool by wire name
    pub fn lookup(name: &str) -> Result<&'static ToolDescriptor> {
        TOOLS
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))
    }

    /// All registered tools
    pub fn all() -> &'static [ToolDescriptor] {
        TOOLS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_lookup() {
        assert_eq!(ToolRegistry::lookup("ipVelocity").unwrap().kind, ToolKind::IpVelocity);
        assert!(matches!(ToolRegistry::lookup("nope"), Err(Error::UnknownTool(_))));
    }

    #[test]
    fn test_names_unique() {
        let names: HashSet<_> = TOOLS.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), TOOLS.len());
    }

    #[test]
    fn test_input_schema() {
        let schema = ToolRegistry::lookup("amountTransaction").unwrap().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["amount"]["type"], "number");
        assert_eq!(schema["required"], json!(["user_id", "transaction_id", "amount"]));
    }

    #[test]
    fn test_counts_are_integers() {
        let schema = ToolRegistry::lookup("userBehavior").unwrap().input_schema();
        assert_eq!(schema["properties"]["transactionsLastDay"]["type"], "integer");
        assert_eq!(schema["properties"]["window_seconds"]["type"], "integer");

        // no count-like argument is advertised as a float
        for tool in TOOLS {
            let schema = tool.input_schema();
            for (name, property) in schema["properties"].as_object().unwrap() {
                let is_count = name.contains("window") || name.contains("history") || name.contains("LastDay");
                if is_count {
                    assert_eq!(property["type"], "integer", "{}.{}", tool.name, name);
                }
            }
        }
    }
}
