//! `jiraq` turns a compact sigil query into JQL and keeps the Jira
//! reference data used for validation in a locally cached store.

/// Bare-sigil detection for resuming into a picker.
pub mod autocomplete;
/// Reference data cache and persistence backends.
pub mod cache;
/// Runtime configuration loading and validation.
pub mod config;
/// Project existence checks and fuzzy suggestions.
pub mod fuzzy;
/// Jira API client and reference data models.
pub mod jira;
/// JQL compilation from a parsed query.
pub mod jql;
/// Logging helpers used throughout the crate.
pub mod logging;
/// Runtime metrics counters.
pub mod metrics;
/// Query tokenizer, classifier, and parser.
pub mod query;
/// Staleness checks and single-flight background refresh.
pub mod refresh;
