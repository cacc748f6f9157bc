use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use jiraq::autocomplete::pending_category;
use jiraq::cache::store::FileStore;
use jiraq::cache::{RefKind, ReferenceCache};
use jiraq::config;
use jiraq::fuzzy::project_hints;
use jiraq::jira::JiraClient;
use jiraq::jql::compile_jql;
use jiraq::logging;
use jiraq::metrics::{self, Metrics};
use jiraq::query::parse_query;
use jiraq::refresh::{refresh_reference_data, ExpiryPolicy, RefreshCoordinator};

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    config_path: Option<PathBuf>,
    default_project: Option<String>,
    refresh: bool,
    query: String,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut parsed = CliArgs::default();
    let mut words: Vec<String> = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args.next().ok_or("--config requires a path")?;
                parsed.config_path = Some(PathBuf::from(value));
            }
            "--project" => {
                let value = args.next().ok_or("--project requires a project key")?;
                parsed.default_project = Some(value);
            }
            "--refresh" => parsed.refresh = true,
            other if other.starts_with("--") => {
                return Err(format!(
                    "unknown flag {other}. usage: jiraq [--config <path>] [--project <key>] [--refresh] [query...]"
                ));
            }
            _ => words.push(arg),
        }
    }
    parsed.query = words.join(" ");
    Ok(parsed)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut raw_args = std::env::args();
    let _program = raw_args.next();
    let args = parse_args(raw_args)?;

    let cfg = match &args.config_path {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };
    logging::init(cfg.logging.debug);

    let metrics = Arc::new(Metrics::new());
    let cache_dir = cfg.cache.resolve_dir()?;
    let store = Arc::new(FileStore::new(&cache_dir)?);
    let cache = Arc::new(ReferenceCache::new(store, Arc::clone(&metrics)));
    let jira = Arc::new(JiraClient::new_with_metrics(
        cfg.jira.base_url.clone(),
        cfg.jira.email.clone(),
        cfg.jira.api_token.clone(),
        Arc::clone(&metrics),
    )?);

    logging::debug(format!(
        "using jira base url {} cache dir {}",
        jira.base_url,
        cache_dir.display()
    ));
    for kind in RefKind::ALL {
        if !cache.exists(kind) {
            logging::debug(format!("{kind} cache not yet populated"));
        }
    }

    if args.refresh {
        logging::info("refreshing reference data...");
        refresh_reference_data(&jira, &cache, &RefKind::ALL)?;
        metrics::log_summary(&metrics);
        return Ok(());
    }

    // A bare sigil means the user is waiting for a picker; hand the
    // category and the query back to the host and stop.
    if let Some(category) = pending_category(&args.query) {
        println!("{}\t{}", category, args.query);
        return Ok(());
    }

    let parsed = parse_query(&args.query, args.default_project.as_deref());

    let policy = ExpiryPolicy::new(
        Duration::from_secs(cfg.cache.projects_max_age_secs),
        Duration::from_secs(cfg.cache.issuetypes_max_age_secs),
        Duration::from_secs(cfg.cache.statuses_max_age_secs),
    );
    let coordinator = RefreshCoordinator::new(
        Arc::clone(&jira),
        Arc::clone(&cache),
        policy,
        Arc::clone(&metrics),
    );
    let outcome = coordinator.check_and_trigger(&RefKind::ALL);
    logging::debug(format!("refresh check: {outcome:?}"));

    // The query is answered from whatever is cached right now; the
    // refresh worker only improves later runs.
    let snapshot = cache.snapshot();
    for hint in project_hints(&parsed.projects, &snapshot.projects, cfg.suggest.limit) {
        if hint.suggestions.is_empty() {
            eprintln!("{} project not found...", hint.input.to_uppercase());
        } else {
            eprintln!(
                "{} project not found... did you mean {}?",
                hint.input.to_uppercase(),
                hint.suggestions.join(", ")
            );
        }
    }

    if let Some(jql) = compile_jql(&parsed) {
        println!("{jql}");
    }

    coordinator.join_running_refresh();
    metrics::log_summary(&metrics);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Result<CliArgs, String> {
        parse_args(raw.iter().map(ToString::to_string))
    }

    #[test]
    fn bare_words_become_the_query() {
        let parsed = args(&["login", "bug", "@platform"]).expect("args");
        assert_eq!(parsed.query, "login bug @platform");
        assert!(!parsed.refresh);
        assert_eq!(parsed.config_path, None);
    }

    #[test]
    fn flags_are_scanned_out_of_the_query() {
        let parsed = args(&[
            "--config",
            "/tmp/jiraq.toml",
            "--project",
            "OPS",
            "crash",
            "on",
            "boot",
        ])
        .expect("args");
        assert_eq!(parsed.config_path, Some(PathBuf::from("/tmp/jiraq.toml")));
        assert_eq!(parsed.default_project.as_deref(), Some("OPS"));
        assert_eq!(parsed.query, "crash on boot");
    }

    #[test]
    fn refresh_flag_stands_alone() {
        let parsed = args(&["--refresh"]).expect("args");
        assert!(parsed.refresh);
        assert!(parsed.query.is_empty());
    }

    #[test]
    fn missing_flag_values_and_unknown_flags_fail() {
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--project"]).is_err());
        assert!(args(&["--frobnicate"]).is_err());
    }
}
