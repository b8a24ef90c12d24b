// ABOUTME: CLI-driven backend: capability probe, tolerant record parsing and the adapter.

mod features;
mod records;
mod runtime;

pub use features::{Feature, FeatureSet, HelpTexts, ProbeError};
pub use runtime::{CliRuntime, DEFAULT_CLI_BINARY};
