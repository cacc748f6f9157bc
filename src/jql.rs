use crate::query::ParsedQuery;

fn in_clause(field: &str, values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|value| format!("'{value}'")).collect();
    format!("{field} in ({})", quoted.join(","))
}

/// Renders a parsed query as JQL. Returns None when the query carries
/// no filters at all. An issue-key query compiles to a bare key lookup
/// without the ordering suffix.
pub fn compile_jql(parsed: &ParsedQuery) -> Option<String> {
    if let Some(key) = &parsed.issue_key {
        return Some(format!("key = '{key}'"));
    }

    let mut clauses = Vec::new();
    let text = parsed.text.trim();
    if !text.is_empty() {
        clauses.push(format!("text ~ '{text}'"));
    }
    if !parsed.projects.is_empty() {
        clauses.push(in_clause("project", &parsed.projects));
    }
    if !parsed.issuetypes.is_empty() {
        clauses.push(in_clause("issuetype", &parsed.issuetypes));
    }
    if !parsed.statuses.is_empty() {
        clauses.push(in_clause("status", &parsed.statuses));
    }
    if !parsed.assignees.is_empty() {
        clauses.push(in_clause("assignee", &parsed.assignees));
    }
    if clauses.is_empty() {
        return None;
    }
    Some(format!("{} ORDER BY created DESC", clauses.join(" AND ")))
}
