use std::sync::OnceLock;

use regex::Regex;

/// A whole issue key, e.g. `FOO-123`. Case-insensitive on the project
/// part, digits only after the dash.
fn issue_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]+-[0-9]+$").expect("issue key regex is valid"))
}

/// A sigil character followed by at least one word character. A bare
/// sigil or a doubled one is ordinary text.
fn sigil_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[@#?%][0-9A-Za-z_]").expect("sigil regex is valid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigilKind {
    Project,
    Issuetype,
    Status,
    Assignee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Token shaped like an issue key. Only promoted to a key lookup
    /// when it is the entire query.
    IssueKey(&'a str),
    /// Sigil-prefixed filter value, with underscores already replaced
    /// by spaces.
    Sigil(SigilKind, String),
    Word(&'a str),
}

fn sigil_kind(byte: u8) -> Option<SigilKind> {
    match byte {
        b'@' => Some(SigilKind::Project),
        b'#' => Some(SigilKind::Issuetype),
        b'?' => Some(SigilKind::Status),
        b'%' => Some(SigilKind::Assignee),
        _ => None,
    }
}

pub fn classify_token(token: &str) -> Token<'_> {
    if issue_key_regex().is_match(token) {
        return Token::IssueKey(token);
    }
    if sigil_regex().is_match(token) {
        if let Some(kind) = sigil_kind(token.as_bytes()[0]) {
            return Token::Sigil(kind, token[1..].replace('_', " "));
        }
    }
    Token::Word(token)
}

/// Structured form of a search query. Sigil values accumulate in input
/// order; free text keeps one trailing space per word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub text: String,
    pub issue_key: Option<String>,
    pub projects: Vec<String>,
    pub issuetypes: Vec<String>,
    pub statuses: Vec<String>,
    pub assignees: Vec<String>,
}

impl ParsedQuery {
    /// True when nothing in the query filters the search.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.issue_key.is_none()
            && self.projects.is_empty()
            && self.issuetypes.is_empty()
            && self.statuses.is_empty()
            && self.assignees.is_empty()
    }
}

/// Splits a raw query on spaces and routes each token by its sigil.
/// A query that is exactly an issue key short-circuits to a key lookup
/// and ignores the default project. Otherwise the default project leads
/// the project list, ahead of any `@` values from the query.
pub fn parse_query(raw: &str, default_project: Option<&str>) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    if issue_key_regex().is_match(raw) {
        parsed.issue_key = Some(raw.to_string());
        return parsed;
    }
    if let Some(project) = default_project {
        if !project.is_empty() {
            parsed.projects.push(project.to_string());
        }
    }
    for token in raw.split(' ') {
        if token.is_empty() {
            continue;
        }
        match classify_token(token) {
            Token::Sigil(SigilKind::Project, value) => parsed.projects.push(value),
            Token::Sigil(SigilKind::Issuetype, value) => parsed.issuetypes.push(value),
            Token::Sigil(SigilKind::Status, value) => parsed.statuses.push(value),
            Token::Sigil(SigilKind::Assignee, value) => parsed.assignees.push(value),
            Token::IssueKey(word) | Token::Word(word) => {
                parsed.text.push_str(word);
                parsed.text.push(' ');
            }
        }
    }
    parsed
}
