//! Command metadata and query matching

use input_types::Chord;
use serde::{Deserialize, Serialize};

/// Everything the registry knows about a command apart from its action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Process-unique name, e.g. `"fuzzy.show_command_finder"`
    pub name: String,
    /// Human-readable title shown by finders
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Default chord bound when the command is registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Chord>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl CommandDescriptor {
    /// Descriptor whose title is the name itself
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            description: String::new(),
            tags: Vec::new(),
            category: None,
            keys: None,
            enabled: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_keys(mut self, keys: Chord) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Checks if this command matches a finder query
    ///
    /// An empty query matches every enabled command.
    pub fn matches(&self, query: &str) -> bool {
        self.enabled && (query.trim().is_empty() || self.relevance_score(query) > 0)
    }

    /// Relevance of this command for `query`; higher is better, 0 is no match
    pub fn relevance_score(&self, query: &str) -> u32 {
        if !self.enabled {
            return 0;
        }
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return 0;
        }

        let title = tier(&self.title, &query, [1000, 500, 100]);
        let name = tier(&self.name, &query, [800, 400, 80]);
        let tags: u32 = self.tags.iter().map(|t| tier(t, &query, [300, 150, 50])).sum();
        let description = tier(&self.description, &query, [10, 10, 10]);

        title.max(name) + tags + description
    }
}

/// Scores exact, prefix and substring matches of `query` in `field`
fn tier(field: &str, query: &str, [exact, prefix, contains]: [u32; 3]) -> u32 {
    let field = field.to_lowercase();
    if field == query {
        exact
    } else if field.starts_with(query) {
        prefix
    } else if field.contains(query) {
        contains
    } else {
        0
    }
}
