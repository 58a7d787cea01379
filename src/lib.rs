//! Core of the Data Apps platform: a parser for the Data App language, typed
//! scopes exchanged between activities and policies, and a fail-closed
//! usage-control engine that gates every activity invocation.

pub mod activity;
mod config;
mod error;
pub mod evaluate;
pub mod parse;
pub mod policy;
mod registry;
mod sandbox;
#[cfg(feature = "binary-cache")]
mod serial;
mod structural;
mod types;

pub use config::{parse_startup_policies, DataAppConfig, ExecutionMode};
pub use error::DataAppError;
pub use parse::{parse_block, parse_data_app, parse_data_app_file, ParsingResult, SyntaxError};
pub use registry::{ActivityProvider, ActivityRegistry, PolicyRegistry};
pub use sandbox::{Invocation, PolicyBinding, Sandbox};
#[cfg(feature = "binary-cache")]
pub use serial::{DeserializeError, SerializeError};
pub use types::*;
