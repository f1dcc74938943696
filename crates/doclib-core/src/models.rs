//! Core data models for the document library.
//!
//! A [`Document`] is one bibliographic record (report, policy, plan, ...)
//! together with its controlled-vocabulary [`Tag`]s and the linked
//! [`Author`], [`Funder`], and [`Event`] entities it joins to. The engine
//! only ever reads these; ingestion owns their lifecycle.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Precision of a document's `date` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateType {
    /// Exact day is known.
    Exact,
    /// Only month and year are known (day is the 1st).
    MonthYear,
    /// Only the year is known (month and day are January 1st).
    Year,
    #[default]
    Unspecified,
}

impl DateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateType::Exact => "exact",
            DateType::MonthYear => "month_year",
            DateType::Year => "year",
            DateType::Unspecified => "unspecified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            DateType::Exact,
            DateType::MonthYear,
            DateType::Year,
            DateType::Unspecified,
        ]
        .into_iter()
        .find(|d| d.as_str() == s)
    }
}

/// Controlled vocabulary a [`Tag`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    KeyTopics,
    CovidTags,
}

impl TagCategory {
    pub const ALL: [TagCategory; 2] = [TagCategory::KeyTopics, TagCategory::CovidTags];

    /// The filter key and snippet field name for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            TagCategory::KeyTopics => "key_topics",
            TagCategory::CovidTags => "covid_tags",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Shared, interned controlled-vocabulary value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub category: TagCategory,
}

/// Authoring organization of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub authoring_organization: String,
    #[serde(default)]
    pub acronym: Option<String>,
    #[serde(default)]
    pub type_of_authoring_organization: Option<String>,
    #[serde(default)]
    pub international_national: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub iso2: Option<String>,
}

/// Organization that financially supported a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Funder {
    pub id: i64,
    pub name: String,
}

/// Public health event (outbreak) a document discusses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    #[serde(default)]
    pub master_id: String,
    pub name: String,
}

/// A bibliographic record with its linked entities.
///
/// `search_text` and `file_search_text` are precomputed, lower-cased
/// concatenations of every searchable attribute and of the scraped
/// attachment text. They are never recomputed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub type_of_record: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub date_type: DateType,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub sub_organizations: Option<String>,
    #[serde(default, skip_serializing)]
    pub search_text: String,
    #[serde(default, skip_serializing)]
    pub file_search_text: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub funders: Vec<Funder>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl Document {
    /// Minimal document with every optional attribute unset.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            title: None,
            description: None,
            type_of_record: None,
            date: None,
            date_type: DateType::Unspecified,
            link: None,
            sub_organizations: None,
            search_text: String::new(),
            file_search_text: String::new(),
            tags: Vec::new(),
            authors: Vec::new(),
            funders: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.date.map(|d| d.year())
    }

    pub fn tags_in(&self, category: TagCategory) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(move |t| t.category == category)
    }
}

/// A read-only view of the whole collection at one ingestion generation.
///
/// Documents are kept in ascending id order; every pass-through ordering
/// in the engine relies on that.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub generation: u64,
    pub documents: Vec<Document>,
}

impl Corpus {
    pub fn new(generation: u64, mut documents: Vec<Document>) -> Self {
        documents.sort_by_key(|d| d.id);
        Self {
            generation,
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
