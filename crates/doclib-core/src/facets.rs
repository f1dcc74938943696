//! Facet counts: per-category value counts for building a filter UI.
//!
//! For each category in [`FACET_CATEGORIES`], documents are counted against
//! the collection filtered by *every active clause except the category's
//! own*. Selecting `2019` in the years facet therefore still reports how
//! many documents `2020` would add, given the other active filters.
//!
//! Counts are of documents, not of linked rows: a document with two
//! authors of the same type counts once for that type.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::filter::{apply, CompiledFilter};
use crate::models::{Document, TagCategory};
use crate::registry::{FilterField, LinkedField, ScalarField};

/// Exclusion token meaning "drop unspecified values".
pub const NULL_TOKEN: &str = "null";

/// How a category extracts its values from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetSource {
    /// Year component of `date`.
    DateYear,
    Tag(TagCategory),
    Linked(LinkedField),
    /// Author organization, carrying acronym and id for display.
    AuthorOrganization,
    Scalar(ScalarField),
}

/// A filterable category and the filter clause it relaxes.
#[derive(Debug, Clone, Copy)]
pub struct FacetCategory {
    pub key: &'static str,
    pub filter: FilterField,
    pub source: FacetSource,
}

pub const FACET_CATEGORIES: &[FacetCategory] = &[
    FacetCategory {
        key: "years",
        filter: FilterField::Years,
        source: FacetSource::DateYear,
    },
    FacetCategory {
        key: "events",
        filter: FilterField::Linked(LinkedField::EventName),
        source: FacetSource::Linked(LinkedField::EventName),
    },
    FacetCategory {
        key: "key_topics",
        filter: FilterField::Tag(TagCategory::KeyTopics),
        source: FacetSource::Tag(TagCategory::KeyTopics),
    },
    FacetCategory {
        key: "covid_tags",
        filter: FilterField::Tag(TagCategory::CovidTags),
        source: FacetSource::Tag(TagCategory::CovidTags),
    },
    FacetCategory {
        key: "authors",
        filter: FilterField::Linked(LinkedField::AuthorId),
        source: FacetSource::AuthorOrganization,
    },
    FacetCategory {
        key: "author_types",
        filter: FilterField::Linked(LinkedField::AuthorType),
        source: FacetSource::Linked(LinkedField::AuthorType),
    },
    FacetCategory {
        key: "funders",
        filter: FilterField::Linked(LinkedField::FunderName),
        source: FacetSource::Linked(LinkedField::FunderName),
    },
    FacetCategory {
        key: "types_of_record",
        filter: FilterField::Scalar(ScalarField::TypeOfRecord),
        source: FacetSource::Scalar(ScalarField::TypeOfRecord),
    },
];

/// One value of a category and its document count.
///
/// Serializes as a JSON array: `[value, count]`, or
/// `[value, acronym, count, id]` for author organizations, with `""`
/// standing in for a missing acronym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FacetBucket {
    Value(Option<String>, usize),
    Entity(Option<String>, String, usize, i64),
}

impl FacetBucket {
    pub fn value(&self) -> Option<&str> {
        match self {
            FacetBucket::Value(v, _) | FacetBucket::Entity(v, _, _, _) => v.as_deref(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            FacetBucket::Value(_, c) | FacetBucket::Entity(_, _, c, _) => *c,
        }
    }
}

/// Counts for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetCountResult {
    /// Distinct documents with at least one non-excluded value.
    pub unique: usize,
    /// Buckets by count descending.
    pub by_value: Vec<FacetBucket>,
}

impl FacetCountResult {
    /// Count for `value` (`None` for unspecified), 0 if absent.
    pub fn count_of(&self, value: Option<&str>) -> usize {
        self.by_value
            .iter()
            .filter(|b| b.value() == value)
            .map(FacetBucket::count)
            .sum()
    }
}

pub type FacetCounts = BTreeMap<String, FacetCountResult>;

/// Grouping key: the value plus, for author organizations, (acronym, id).
type BucketKey = (Option<String>, Option<(String, i64)>);

impl FacetSource {
    fn keys(&self, doc: &Document) -> BTreeSet<BucketKey> {
        match self {
            FacetSource::DateYear => BTreeSet::from([(doc.year().map(|y| y.to_string()), None)]),
            FacetSource::Tag(category) => doc
                .tags_in(*category)
                .map(|t| (Some(t.name.clone()), None))
                .collect(),
            FacetSource::Linked(field) => field
                .values(doc)
                .into_iter()
                .map(|v| (v.map(|v| v.into_owned()), None))
                .collect(),
            FacetSource::AuthorOrganization => doc
                .authors
                .iter()
                .map(|a| {
                    (
                        Some(a.authoring_organization.clone()),
                        Some((a.acronym.clone().unwrap_or_default(), a.id)),
                    )
                })
                .collect(),
            FacetSource::Scalar(field) => {
                BTreeSet::from([(field.value(doc).map(|v| v.into_owned()), None)])
            }
        }
    }
}

fn is_excluded(value: &Option<String>, exclude: &HashSet<String>) -> bool {
    match value {
        Some(v) => exclude.contains(v),
        None => exclude.contains(NULL_TOKEN),
    }
}

fn cmp_nulls_last(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Count one category over an already-narrowed candidate pool.
pub fn count_category(
    pool: &[&Document],
    source: FacetSource,
    exclude: &HashSet<String>,
) -> FacetCountResult {
    let mut counts: BTreeMap<BucketKey, usize> = BTreeMap::new();
    let mut unique = 0;

    for doc in pool {
        let mut contributed = false;
        for key in source.keys(doc) {
            if is_excluded(&key.0, exclude) {
                continue;
            }
            contributed = true;
            *counts.entry(key).or_insert(0) += 1;
        }
        if contributed {
            unique += 1;
        }
    }

    let mut buckets: Vec<(BucketKey, usize)> = counts.into_iter().collect();
    buckets.sort_by(|(ka, ca), (kb, cb)| {
        cb.cmp(ca)
            .then_with(|| cmp_nulls_last(&ka.0, &kb.0))
            .then_with(|| ka.1.cmp(&kb.1))
    });

    let by_value = buckets
        .into_iter()
        .map(|((value, extra), count)| match extra {
            Some((acronym, id)) => FacetBucket::Entity(value, acronym, count, id),
            None => FacetBucket::Value(value, count),
        })
        .collect();

    FacetCountResult { unique, by_value }
}

/// Compute counts for every category in [`FACET_CATEGORIES`].
///
/// `base` must be `apply(all, filter, search_text)`. It is reused as the
/// candidate pool for categories the filter does not constrain; every
/// other category re-filters `all` with its own clause relaxed.
pub fn compute_facet_counts(
    base: &[&Document],
    all: &[Document],
    filter: &CompiledFilter,
    search_text: Option<&str>,
    exclude: &HashSet<String>,
) -> FacetCounts {
    FACET_CATEGORIES
        .iter()
        .map(|category| {
            let result = if filter.constrains(category.filter) {
                let relaxed = filter.without(category.filter);
                let pool = apply(all, &relaxed, search_text);
                count_category(&pool, category.source, exclude)
            } else {
                count_category(base, category.source, exclude)
            };
            (category.key.to_string(), result)
        })
        .collect()
}
