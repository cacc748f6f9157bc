use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32Str};

use crate::jira::Project;

/// Case-insensitive exact match against the known project keys.
pub fn project_exists(key: &str, projects: &[Project]) -> bool {
    projects
        .iter()
        .any(|project| project.key.eq_ignore_ascii_case(key))
}

/// Closest project keys to the input, best match first, ties broken
/// alphabetically so output is stable across runs.
pub fn suggest_projects(input: &str, projects: &[Project], limit: usize) -> Vec<String> {
    if input.is_empty() || projects.is_empty() || limit == 0 {
        return Vec::new();
    }
    let pattern = Pattern::new(
        input,
        CaseMatching::Ignore,
        Normalization::Smart,
        AtomKind::Fuzzy,
    );
    let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
    let mut buf = Vec::new();
    let mut scored: Vec<(u32, String)> = Vec::new();
    for project in projects {
        let haystack = Utf32Str::new(&project.key, &mut buf);
        if let Some(score) = pattern.score(haystack, &mut matcher) {
            scored.push((score, project.key.clone()));
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.truncate(limit);
    scored.into_iter().map(|(_, key)| key).collect()
}

/// A project filter value that matched nothing, with its closest
/// alternatives. Suggestions may be empty when nothing comes close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHint {
    pub input: String,
    pub suggestions: Vec<String>,
}

pub fn project_hints(
    candidates: &[String],
    projects: &[Project],
    limit: usize,
) -> Vec<ProjectHint> {
    let mut hints = Vec::new();
    for candidate in candidates {
        if project_exists(candidate, projects) {
            continue;
        }
        hints.push(ProjectHint {
            input: candidate.clone(),
            suggestions: suggest_projects(candidate, projects, limit),
        });
    }
    hints
}
