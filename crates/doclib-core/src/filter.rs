//! Filter engine: narrows a document set by a [`FilterSpec`] and free text.
//!
//! A filter spec is compiled once into a [`CompiledFilter`], a list of typed
//! [`Predicate`]s, one per active key. Each predicate is an independent
//! per-document membership test, so the result is the intersection of the
//! per-key sets and the order keys are applied in never matters.
//!
//! # Year ranges
//!
//! `{"years": ["range_2019_null"]}` keeps documents dated 2019 or later.
//! Either bound may be `null` (unbounded, read as 0 or 9999). A range
//! whose start is after its end is rejected.

use std::collections::{BTreeMap, HashSet};

use crate::error::{SearchError, SearchResult};
use crate::models::{Document, TagCategory};
use crate::registry::{FilterField, LinkedField, ScalarField};

/// Filter key → allowed values. OR within a key, AND across keys.
pub type FilterSpec = BTreeMap<String, Vec<String>>;

/// Characters of `file_search_text` considered by the free-text filter.
pub const FILE_TEXT_WINDOW: usize = 1000;

const RANGE_PREFIX: &str = "range";
const RANGE_OPEN_START: i32 = 0;
const RANGE_OPEN_END: i32 = 9999;

/// A single compiled filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Scalar {
        field: ScalarField,
        allowed: HashSet<String>,
    },
    Tag {
        category: TagCategory,
        allowed: HashSet<String>,
    },
    Linked {
        field: LinkedField,
        allowed: HashSet<String>,
    },
    YearIn(HashSet<String>),
    YearRange {
        start: i32,
        end: i32,
    },
}

impl Predicate {
    /// Build the predicate for `field` from its non-empty allowed values.
    pub fn compile(field: FilterField, values: &[String]) -> SearchResult<Predicate> {
        let allowed = || values.iter().cloned().collect::<HashSet<String>>();
        Ok(match field {
            FilterField::Scalar(field) => Predicate::Scalar {
                field,
                allowed: allowed(),
            },
            FilterField::Tag(category) => Predicate::Tag {
                category,
                allowed: allowed(),
            },
            FilterField::Linked(field) => Predicate::Linked {
                field,
                allowed: allowed(),
            },
            FilterField::Years => match values {
                [only] if only.starts_with(RANGE_PREFIX) => {
                    let (start, end) = parse_year_range(only)?;
                    Predicate::YearRange { start, end }
                }
                _ => Predicate::YearIn(allowed()),
            },
        })
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::Scalar { field, allowed } => field
                .value(doc)
                .is_some_and(|v| allowed.contains(&*v)),
            Predicate::Tag { category, allowed } => {
                doc.tags_in(*category).any(|t| allowed.contains(&t.name))
            }
            Predicate::Linked { field, allowed } => field
                .values(doc)
                .into_iter()
                .flatten()
                .any(|v| allowed.contains(&*v)),
            Predicate::YearIn(allowed) => doc
                .year()
                .is_some_and(|y| allowed.contains(&y.to_string())),
            Predicate::YearRange { start, end } => doc
                .year()
                .is_some_and(|y| (*start..=*end).contains(&y)),
        }
    }
}

/// Parse `range_<start>_<end>`, where either bound may be `null`.
pub fn parse_year_range(token: &str) -> SearchResult<(i32, i32)> {
    let malformed = || SearchError::MalformedYearRange(token.to_string());
    let rest = token
        .strip_prefix(RANGE_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or_else(malformed)?;
    let (start, end) = rest.split_once('_').ok_or_else(malformed)?;

    let bound = |s: &str, open: i32| -> SearchResult<i32> {
        if s == "null" {
            Ok(open)
        } else {
            s.trim().parse::<i32>().map_err(|_| malformed())
        }
    };
    let start = bound(start, RANGE_OPEN_START)?;
    let end = bound(end, RANGE_OPEN_END)?;

    if start > end {
        return Err(SearchError::InvalidYearRange { start, end });
    }
    Ok((start, end))
}

/// A validated filter specification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    clauses: Vec<(FilterField, Predicate)>,
}

impl CompiledFilter {
    /// Resolve and compile every key of `spec`.
    ///
    /// Unknown keys are rejected. Keys with an empty value list are
    /// dropped: they constrain nothing.
    pub fn compile(spec: &FilterSpec) -> SearchResult<Self> {
        let mut clauses = Vec::with_capacity(spec.len());
        for (key, values) in spec {
            let field = FilterField::resolve(key)
                .ok_or_else(|| SearchError::UnknownFilterKey(key.clone()))?;
            if values.is_empty() {
                continue;
            }
            clauses.push((field, Predicate::compile(field, values)?));
        }
        Ok(Self { clauses })
    }

    /// True if this filter has an active clause on `field`.
    pub fn constrains(&self, field: FilterField) -> bool {
        self.clauses.iter().any(|(f, _)| *f == field)
    }

    /// Copy of this filter with the clause on `field` relaxed.
    pub fn without(&self, field: FilterField) -> CompiledFilter {
        CompiledFilter {
            clauses: self
                .clauses
                .iter()
                .filter(|(f, _)| *f != field)
                .cloned()
                .collect(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|(_, p)| p.matches(doc))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }
}

/// Lower-cased free-text needle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    needle: String,
}

impl TextQuery {
    /// `None` for absent or blank search text.
    pub fn new(text: Option<&str>) -> Option<TextQuery> {
        text.filter(|t| !t.trim().is_empty()).map(|t| TextQuery {
            needle: t.to_lowercase(),
        })
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.search_text.to_lowercase().contains(&self.needle)
            || leading_chars(&doc.file_search_text, FILE_TEXT_WINDOW)
                .to_lowercase()
                .contains(&self.needle)
    }
}

/// The first `n` characters of `s`.
fn leading_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Narrow `documents` by `filter`, then by free text when present.
///
/// Input order is preserved.
pub fn apply<'a, I>(documents: I, filter: &CompiledFilter, search_text: Option<&str>) -> Vec<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    let text = TextQuery::new(search_text);
    documents
        .into_iter()
        .filter(|doc| filter.matches(doc))
        .filter(|doc| text.as_ref().map_or(true, |t| t.matches(doc)))
        .collect()
}

/// Compile `spec` and apply it in one step.
pub fn apply_spec<'a>(
    documents: &'a [Document],
    spec: &FilterSpec,
    search_text: Option<&str>,
) -> SearchResult<Vec<&'a Document>> {
    let filter = CompiledFilter::compile(spec)?;
    Ok(apply(documents, &filter, search_text))
}
