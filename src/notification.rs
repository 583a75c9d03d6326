//! Turns a batch of [`RawEvent`]s into a single webhook message.
//!
//! The message shape is the Discord-style `{content, embeds: [...]}` body.
//! Each [`Category`] becomes one embed, and only categories that received at
//! least one field are included, always in the order new, deleted, changes.

use crate::config::AppConfig;
use crate::event::{base_name, EventKind, RawEvent};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Rendered in place of a path that cannot be expressed relative to the base folder.
pub const PATH_PLACEHOLDER: &str = "...";

/// Notification groupings, in the order they appear in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    NewFiles,
    DeletedFiles,
    Changes,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::NewFiles, Category::DeletedFiles, Category::Changes];

    pub fn title(self) -> &'static str {
        match self {
            Category::NewFiles => "New files",
            Category::DeletedFiles => "Deleted files",
            Category::Changes => "Changes",
        }
    }

    pub fn color(self) -> u32 {
        match self {
            Category::NewFiles => 2667354,
            Category::DeletedFiles => 14701138,
            Category::Changes => 8750469,
        }
    }

    fn index(self) -> usize {
        match self {
            Category::NewFiles => 0,
            Category::DeletedFiles => 1,
            Category::Changes => 2,
        }
    }
}

/// Top-level webhook body.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

impl WebhookMessage {
    /// Total number of fields across all embeds.
    pub fn field_count(&self) -> usize {
        self.embeds.iter().map(|e| e.fields.len()).sum()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    pub fn new(category: Category) -> Self {
        Self {
            title: category.title().to_string(),
            description: None,
            color: category.color(),
            fields: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// Renders events against a base folder and optional link prefix.
#[derive(Debug, Clone)]
pub struct Formatter {
    base: PathBuf,
    web_link: Option<String>,
}

impl Formatter {
    pub fn new(base: impl Into<PathBuf>, web_link: Option<String>) -> Self {
        Self {
            base: base.into(),
            web_link: web_link.filter(|l| !l.is_empty()),
        }
    }

    pub fn from_config(app_config: &AppConfig) -> Self {
        Self::new(app_config.folder.clone(), app_config.web_link.clone())
    }

    /// Path relative to the base folder, or [`PATH_PLACEHOLDER`] when `path`
    /// lies outside it.
    pub fn relative_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.base) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(
                    "Cannot make {} relative to {}: {}",
                    path.display(),
                    self.base.display(),
                    e
                );
                PATH_PLACEHOLDER.to_string()
            }
        }
    }

    /// Link to a new file: the prefix followed by the escaped absolute path.
    pub fn web_link_for(&self, path: &Path) -> Option<String> {
        self.web_link
            .as_ref()
            .map(|prefix| format!("{}{}", prefix, escape_path(path)))
    }

    /// The category and field an event contributes, if any.
    pub fn field_for(&self, event: &RawEvent) -> Option<(Category, EmbedField)> {
        if event.is_dir {
            return None;
        }

        let (category, value) = match event.kind {
            EventKind::Remove => (
                Category::DeletedFiles,
                format!("`{}`", self.relative_path(&event.path)),
            ),
            EventKind::Create => {
                let mut value = format!("`{}`", self.relative_path(&event.path));
                if let Some(link) = self.web_link_for(&event.path) {
                    value.push_str(&format!("\n[web link]({})", link));
                }
                (Category::NewFiles, value)
            }
            EventKind::Move => {
                let from = event
                    .prior_path
                    .as_deref()
                    .map(|p| self.relative_path(p))
                    .unwrap_or_else(|| PATH_PLACEHOLDER.to_string());
                (
                    Category::Changes,
                    format!("Move from `{}` to `{}`", from, self.relative_path(&event.path)),
                )
            }
            EventKind::Rename => (
                Category::Changes,
                format!("Rename to `{}`", base_name(&event.path)),
            ),
            EventKind::Other => return None,
        };

        Some((
            category,
            EmbedField {
                name: event.name.clone(),
                value,
            },
        ))
    }

    /// Builds one message from a drained batch. `None` when nothing in the
    /// batch is worth reporting.
    pub fn build(&self, events: &[RawEvent]) -> Option<WebhookMessage> {
        let mut embeds = Category::ALL.map(Embed::new);

        for event in events {
            debug!("Dispatching event: {:?}", event);
            if let Some((category, field)) = self.field_for(event) {
                embeds[category.index()].fields.push(field);
            }
        }

        let embeds: Vec<Embed> = embeds
            .into_iter()
            .filter(|embed| !embed.fields.is_empty())
            .collect();

        if embeds.is_empty() {
            return None;
        }

        Some(WebhookMessage {
            content: String::new(),
            embeds,
        })
    }
}

/// Query-component escaping of a path: `/` becomes `%2F`, space becomes `+`.
pub fn escape_path(path: &Path) -> String {
    url::form_urlencoded::byte_serialize(path.to_string_lossy().as_bytes()).collect()
}
