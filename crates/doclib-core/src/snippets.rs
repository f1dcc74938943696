//! Match snippets for explain-results responses.
//!
//! [`explain`] reports which fields of a document contain the search text,
//! with every case-insensitive occurrence wrapped in
//! `<highlight>`…`</highlight>`. Attachment text is never echoed back:
//! a hit there is reported as `"file_search_text": true`.

use std::collections::BTreeMap;

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::models::{Document, TagCategory};
use crate::registry::ScalarField;

pub const HIGHLIGHT_OPEN: &str = "<highlight>";
pub const HIGHLIGHT_CLOSE: &str = "</highlight>";

const PLAIN_FIELDS: &[(&str, ScalarField)] = &[
    ("type_of_record", ScalarField::TypeOfRecord),
    ("title", ScalarField::Title),
    ("description", ScalarField::Description),
    ("link", ScalarField::Link),
    ("sub_organizations", ScalarField::SubOrganizations),
];

const AUTHOR_ORGANIZATION: &str = "author.authoring_organization";
const AUTHOR_ACRONYM: &str = "author.acronym";
const FUNDER_NAME: &str = "funder.name";
const FILE_SEARCH_TEXT: &str = "file_search_text";

/// A matching tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSnippet {
    pub name: String,
    pub id: i64,
}

/// A matching linked entity, serialized as `{<field>: value, "id": id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedSnippet {
    pub field: &'static str,
    pub value: String,
    pub id: i64,
}

impl Serialize for LinkedSnippet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.field, &self.value)?;
        map.serialize_entry("id", &self.id)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SnippetValue {
    Text(String),
    Tags(Vec<TagSnippet>),
    Linked(Vec<LinkedSnippet>),
    Flag(bool),
}

/// Field name → snippet. Empty when nothing matched.
pub type SnippetMap = BTreeMap<String, SnippetValue>;

/// Case-insensitive highlighter for one search text.
#[derive(Debug, Clone)]
pub struct Highlighter {
    pattern: Regex,
}

impl Highlighter {
    /// `None` for blank text.
    pub fn new(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        let pattern = Regex::new(&format!("(?i){}", regex::escape(text))).ok()?;
        Some(Self { pattern })
    }

    /// True exactly when [`highlight`](Highlighter::highlight) marks something.
    pub fn is_match(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }

    /// Highlight every occurrence, `None` if `value` does not match.
    pub fn highlight(&self, value: &str) -> Option<String> {
        if !self.is_match(value) {
            return None;
        }
        let marked = format!("{HIGHLIGHT_OPEN}$0{HIGHLIGHT_CLOSE}");
        Some(self.pattern.replace_all(value, marked.as_str()).into_owned())
    }

    /// Wrap all of `value` in markers.
    pub fn highlight_whole(value: &str) -> String {
        format!("{HIGHLIGHT_OPEN}{value}{HIGHLIGHT_CLOSE}")
    }
}

/// Explain why `doc` matched `highlighter`'s search text.
pub fn explain(doc: &Document, highlighter: &Highlighter) -> SnippetMap {
    let mut snippets = SnippetMap::new();

    for (name, field) in PLAIN_FIELDS {
        if let Some(marked) = field.value(doc).and_then(|v| highlighter.highlight(&v)) {
            snippets.insert(name.to_string(), SnippetValue::Text(marked));
        }
    }

    for category in TagCategory::ALL {
        let tags: Vec<TagSnippet> = doc
            .tags_in(category)
            .filter_map(|t| {
                highlighter
                    .highlight(&t.name)
                    .map(|name| TagSnippet { name, id: t.id })
            })
            .collect();
        if !tags.is_empty() {
            snippets.insert(category.as_str().to_string(), SnippetValue::Tags(tags));
        }
    }

    let organizations: Vec<LinkedSnippet> = doc
        .authors
        .iter()
        .filter_map(|a| {
            highlighter
                .highlight(&a.authoring_organization)
                .map(|value| LinkedSnippet {
                    field: AUTHOR_ORGANIZATION,
                    value,
                    id: a.id,
                })
        })
        .collect();
    insert_linked(&mut snippets, AUTHOR_ORGANIZATION, organizations);

    // acronym hits display the full organization name
    let acronyms: Vec<LinkedSnippet> = doc
        .authors
        .iter()
        .filter(|a| a.acronym.as_deref().is_some_and(|ac| highlighter.is_match(ac)))
        .map(|a| LinkedSnippet {
            field: AUTHOR_ACRONYM,
            value: Highlighter::highlight_whole(&a.authoring_organization),
            id: a.id,
        })
        .collect();
    insert_linked(&mut snippets, AUTHOR_ACRONYM, acronyms);

    let funders: Vec<LinkedSnippet> = doc
        .funders
        .iter()
        .filter_map(|f| {
            highlighter.highlight(&f.name).map(|value| LinkedSnippet {
                field: FUNDER_NAME,
                value,
                id: f.id,
            })
        })
        .collect();
    insert_linked(&mut snippets, FUNDER_NAME, funders);

    if highlighter.is_match(&doc.file_search_text) {
        snippets.insert(FILE_SEARCH_TEXT.to_string(), SnippetValue::Flag(true));
    }

    snippets
}

fn insert_linked(snippets: &mut SnippetMap, key: &str, found: Vec<LinkedSnippet>) {
    if !found.is_empty() {
        snippets.insert(key.to_string(), SnippetValue::Linked(found));
    }
}
