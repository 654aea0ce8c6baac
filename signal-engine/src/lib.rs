//! Signal Engine
//!
//! Rolling-window fraud signal evaluators sharing one bounded per-entity
//! history store and one scoring shape.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluators;
pub mod history;
pub mod lookup;
pub mod tools;
pub mod types;

pub use config::EngineConfig;
pub use engine::SignalEngine;
pub use error::{Error, Result};
pub use history::{EntityHistoryStore, WindowLimits};
pub use lookup::{DohRecordLookup, DomainRecordLookup, StaticRecordLookup};
pub use tools::{ToolDescriptor, ToolKind, ToolRegistry};
pub use types::*;
