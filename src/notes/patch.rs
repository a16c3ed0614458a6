//! Partial note updates as sent by clients in a `sync` action
//!
//! A patch distinguishes three states per nullable field: absent (untouched),
//! explicit `null` (cleared) and a value (overwritten). Only `date` and
//! `description` can be cleared; for every other field `null` means absent.

use crate::neo4j::models::{Note, NoteOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Absent -> `None`, `null` -> `Some(None)`, value -> `Some(Some(v))`
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Fields a client may set on a note
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    pub id: String,
    /// Revision the client based its change on
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub steward: Option<String>,
    #[serde(default)]
    pub invitations: Option<Vec<String>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub checked: Option<bool>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<String>>,
    #[serde(default, rename = "ref")]
    pub refs: Option<Vec<String>>,
    #[serde(default)]
    pub options: Option<NoteOptions>,
    #[serde(default)]
    pub background_url: Option<String>,
    #[serde(default)]
    pub collapsed: Option<bool>,
    #[serde(default)]
    pub estimate: Option<f64>,
}

impl NotePatch {
    /// Parse a patch from the raw JSON object of one note
    pub fn from_json(object: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(object.clone()))
    }

    /// Whether applying this patch changes the note's edges
    pub fn touches_graph(&self) -> bool {
        self.items.is_some() || self.refs.is_some()
    }

    /// Merge every present field onto `note`.
    ///
    /// `id`, `rev`, `steward` and timestamps are never taken from a patch.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(invitations) = &self.invitations {
            note.invitations = invitations.clone();
        }
        if let Some(name) = &self.name {
            note.name = name.clone();
        }
        if let Some(date) = self.date {
            note.date = date;
        }
        if let Some(description) = &self.description {
            note.description = description.clone();
        }
        if let Some(checked) = self.checked {
            note.checked = Some(checked);
        }
        if let Some(color) = &self.color {
            note.color = Some(color.clone());
        }
        if let Some(items) = &self.items {
            note.items = items.clone();
        }
        if let Some(refs) = &self.refs {
            note.refs = refs.clone();
        }
        if let Some(options) = &self.options {
            note.options = Some(options.clone());
        }
        if let Some(background_url) = &self.background_url {
            note.background_url = Some(background_url.clone());
        }
        if let Some(collapsed) = self.collapsed {
            note.collapsed = Some(collapsed);
        }
        if let Some(estimate) = self.estimate {
            note.estimate = Some(estimate);
        }
    }

    /// Build a brand new note from this patch, owned by `steward` unless the
    /// patch names one
    pub fn to_new_note(&self, steward: &str) -> Note {
        let mut note = Note::new(self.id.clone());
        note.steward = Some(
            self.steward
                .clone()
                .unwrap_or_else(|| steward.to_string()),
        );
        self.apply_to(&mut note);
        note
    }
}
