use std::fmt;

/// Reference dataset a bare sigil asks to browse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Project,
    Issuetype,
    Status,
    Assignee,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Project => "project",
            Category::Issuetype => "issuetype",
            Category::Status => "status",
            Category::Assignee => "assignee",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finds the first token that is exactly a sigil with no value yet,
/// meaning the user has picked a filter and is waiting for choices.
pub fn pending_category(raw: &str) -> Option<Category> {
    for token in raw.split(' ') {
        match token {
            "@" => return Some(Category::Project),
            "#" => return Some(Category::Issuetype),
            "?" => return Some(Category::Status),
            "%" => return Some(Category::Assignee),
            _ => {}
        }
    }
    None
}
