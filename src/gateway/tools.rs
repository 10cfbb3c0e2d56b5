//! Tools callable through `callTool`.

/// Assignee returned when no rule matches.
pub const UNASSIGNED: &str = "unassigned";

/// Keyword rules in priority order; the first rule with a keyword contained
/// in the lowercased title wins.
const ASSIGNEE_RULES: &[(&[&str], &str)] = &[
    (&["fix", "bug"], "alice"),
    (&["design", "ux"], "bob"),
    (&["deploy", "ci"], "ci-bot"),
];

/// Tools known to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// Classify a task title into an assignee tag.
    SuggestAssignee,
    /// Snapshot of the task collection.
    ListTasks,
}

impl Tool {
    /// Resolves a tool by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "suggestAssignee" => Some(Self::SuggestAssignee),
            "listTasks" => Some(Self::ListTasks),
            _ => None,
        }
    }
}

/// Suggests an assignee for a task title by substring match.
#[must_use]
pub fn suggest_assignee(title: &str) -> &'static str {
    let lowered = title.to_lowercase();
    ASSIGNEE_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(*k)))
        .map_or(UNASSIGNED, |&(_, assignee)| assignee)
}
