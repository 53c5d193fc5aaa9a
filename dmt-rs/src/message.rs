//! Message document model.
//!
//! The document is the single mutable output of one evaluation run.  Its
//! shape mirrors the chat API's message payload: `content`, `attachments`,
//! and `embeds` with author/image/footer/field sub-objects.
//!
//! Lazily created sub-objects are reached through explicit get-or-create
//! accessors ([`MessageDocument::embed`], [`Embed::author`],
//! [`Embed::last_field`], …) so statements never need a presence check.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether absent values serialize as `null` or are left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NullPolicy {
    #[default]
    Omit,
    Include,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageDocument {
    pub content: Option<String>,
    pub attachments: Vec<Attachment>,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attachment {
    pub url: String,
}

/// Embed kind.  The chat API only accepts `rich` for bot-built embeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedKind {
    #[default]
    Rich,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: EmbedKind,
    pub description: Option<String>,
    pub url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub color: Option<i64>,
    author: Option<Author>,
    image: Option<Image>,
    footer: Option<Footer>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Author {
    pub name: String,
    pub url: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Footer {
    pub text: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Field {
    #[serde(rename = "name")]
    pub title: String,
    #[serde(rename = "value")]
    pub text: String,
    pub inline: bool,
}

// ── Accessors ─────────────────────────────────────────────────────────────────

impl MessageDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current embed: the first one, created on demand.
    pub fn embed(&mut self) -> &mut Embed {
        if self.embeds.is_empty() {
            self.embeds.push(Embed::default());
        }
        &mut self.embeds[0]
    }

    pub fn attach(&mut self, url: impl Into<String>) {
        self.attachments.push(Attachment { url: url.into() });
    }

    /// Serialize to JSON text under `policy`.
    pub fn to_json(&self, policy: NullPolicy, pretty: bool) -> serde_json::Result<String> {
        let mut json = serde_json::to_value(self)?;
        if policy == NullPolicy::Omit {
            strip_nulls(&mut json);
        }
        if pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        }
    }
}

impl Embed {
    /// Author, materialized empty on first read.
    pub fn author(&mut self) -> &mut Author {
        self.author.get_or_insert_with(Author::default)
    }

    pub fn set_author(&mut self, author: Option<Author>) {
        self.author = author;
    }

    /// Image, materialized empty on first read.
    pub fn image(&mut self) -> &mut Image {
        self.image.get_or_insert_with(Image::default)
    }

    /// Footer, materialized empty on first read.
    pub fn footer(&mut self) -> &mut Footer {
        self.footer.get_or_insert_with(Footer::default)
    }

    pub fn set_footer(&mut self, footer: Option<Footer>) {
        self.footer = footer;
    }

    /// The last field, appending an empty one if there are none.
    pub fn last_field(&mut self) -> &mut Field {
        if self.fields.is_empty() {
            self.fields.push(Field::default());
        }
        let last = self.fields.len() - 1;
        &mut self.fields[last]
    }

    /// Read-only view that does not materialize anything.
    pub fn peek_author(&self) -> Option<&Author> {
        self.author.as_ref()
    }

    pub fn peek_image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    pub fn peek_footer(&self) -> Option<&Footer> {
        self.footer.as_ref()
    }
}

/// Recursively drop `null` members of JSON objects.
fn strip_nulls(json: &mut serde_json::Value) {
    match json {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
