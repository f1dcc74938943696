//! Result ordering: date, title, or free-text relevance.
//!
//! Date and title orderings stay deferred: they produce a
//! [`DocumentQuery`] that the store orders natively. Relevance ordering has
//! to score every candidate, so it materializes the selection into a
//! concrete list. [`OrderedResult`] makes the two shapes explicit and the
//! paginator handles both.
//!
//! Every ordering puts documents with a null sort value last, in both
//! directions, and breaks ties by ascending id.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::filter::TextQuery;
use crate::models::Document;
use crate::store::DocumentQuery;

/// Score for a search-text hit in the title.
pub const TITLE_SCORE: u8 = 3;
/// Score for a search-text hit in the description.
pub const DESCRIPTION_SCORE: u8 = 2;

/// Requested result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    Date,
    Title,
    Relevance,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Date => "date",
            OrderBy::Title => "title",
            OrderBy::Relevance => "relevance",
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderBy {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(OrderBy::Date),
            "title" => Ok(OrderBy::Title),
            "relevance" => Ok(OrderBy::Relevance),
            other => Err(SearchError::UnknownOrderBy(other.to_string())),
        }
    }
}

/// A field the store can order by natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Date,
    Title,
}

/// An ordered selection, either still deferred to the store or already
/// materialized in memory.
#[derive(Debug, Clone)]
pub enum OrderedResult {
    Deferred(DocumentQuery),
    Materialized(Vec<Document>),
}

impl OrderedResult {
    pub fn is_materialized(&self) -> bool {
        matches!(self, OrderedResult::Materialized(_))
    }

    /// Pin a deferred query to the snapshot generation it came from.
    pub fn at_generation(self, generation: u64) -> Self {
        match self {
            OrderedResult::Deferred(query) => {
                OrderedResult::Deferred(query.at_generation(generation))
            }
            materialized => materialized,
        }
    }
}

fn cmp_present_first<T: Ord>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Total order used for store-native sorting.
///
/// Nulls sort last regardless of `descending`; ties fall back to id
/// ascending. Titles compare byte-wise.
pub fn compare_documents(a: &Document, b: &Document, key: SortKey, descending: bool) -> Ordering {
    let primary = match key {
        SortKey::Date => cmp_present_first(a.date, b.date, descending),
        SortKey::Title => cmp_present_first(a.title.as_deref(), b.title.as_deref(), descending),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

/// Relevance of `doc` to `text`: title hit, then description hit, else 0.
pub fn relevance_score(doc: &Document, text: &TextQuery) -> u8 {
    let hit = |field: &Option<String>| {
        field
            .as_deref()
            .is_some_and(|v| v.to_lowercase().contains(text.needle()))
    };
    if hit(&doc.title) {
        TITLE_SCORE
    } else if hit(&doc.description) {
        DESCRIPTION_SCORE
    } else {
        0
    }
}

/// Order a filtered selection.
///
/// `selection` is expected in ascending id order, as produced by
/// [`filter::apply`](crate::filter::apply) over a corpus. Relevance
/// ordering always ranks higher scores first; `descending` only applies
/// to date and title.
pub fn order(
    selection: &[&Document],
    order_by: Option<OrderBy>,
    descending: bool,
    search_text: Option<&str>,
) -> OrderedResult {
    let ids = || selection.iter().map(|d| d.id).collect::<Vec<_>>();
    match order_by {
        Some(OrderBy::Date) => {
            OrderedResult::Deferred(DocumentQuery::sorted(ids(), SortKey::Date, descending))
        }
        Some(OrderBy::Title) => {
            OrderedResult::Deferred(DocumentQuery::sorted(ids(), SortKey::Title, descending))
        }
        Some(OrderBy::Relevance) => match TextQuery::new(search_text) {
            Some(text) => {
                let mut scored: Vec<(u8, &Document)> = selection
                    .iter()
                    .map(|d| (relevance_score(d, &text), *d))
                    .collect();
                // stable: equal scores keep pool order
                scored.sort_by(|a, b| b.0.cmp(&a.0));
                OrderedResult::Materialized(scored.into_iter().map(|(_, d)| d.clone()).collect())
            }
            None => OrderedResult::Deferred(DocumentQuery::unsorted(ids())),
        },
        None => OrderedResult::Deferred(DocumentQuery::unsorted(ids())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn doc(id: i64, year: Option<i32>, title: Option<&str>) -> Document {
        let mut d = Document::new(id);
        d.date = year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1));
        d.title = title.map(Into::into);
        d
    }

    fn sorted_ids(docs: &mut [Document], key: SortKey, descending: bool) -> Vec<i64> {
        docs.sort_by(|a, b| compare_documents(a, b, key, descending));
        docs.iter().map(|d| d.id).collect()
    }

    #[test]
    fn test_order_by_parse() {
        assert_eq!("date".parse::<OrderBy>().unwrap(), OrderBy::Date);
        assert_eq!("relevance".parse::<OrderBy>().unwrap(), OrderBy::Relevance);
        assert!(matches!(
            "popularity".parse::<OrderBy>(),
            Err(SearchError::UnknownOrderBy(_))
        ));
    }

    #[test]
    fn test_date_nulls_last_both_directions() {
        let mut docs = vec![
            doc(3, None, Some("Draft")),
            doc(1, Some(2020), Some("Pandemic plan")),
            doc(2, Some(2019), Some("Outbreak report")),
        ];
        assert_eq!(sorted_ids(&mut docs, SortKey::Date, true), vec![1, 2, 3]);
        assert_eq!(sorted_ids(&mut docs, SortKey::Date, false), vec![2, 1, 3]);
    }

    #[test]
    fn test_title_nulls_last_and_id_ties() {
        let mut docs = vec![
            doc(4, None, None),
            doc(3, None, Some("B")),
            doc(2, None, Some("A")),
            doc(1, None, Some("B")),
        ];
        assert_eq!(sorted_ids(&mut docs, SortKey::Title, false), vec![2, 1, 3, 4]);
        assert_eq!(sorted_ids(&mut docs, SortKey::Title, true), vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_relevance_title_beats_description() {
        let mut by_description = doc(1, None, Some("Annual report"));
        by_description.description = Some("Covers pandemic response".into());
        let by_title = doc(2, None, Some("Pandemic plan"));
        let neither = doc(3, None, Some("Budget"));
        let pool = [&by_description, &by_title, &neither];

        match order(&pool, Some(OrderBy::Relevance), false, Some("PANDEMIC")) {
            OrderedResult::Materialized(docs) => {
                let ids: Vec<i64> = docs.iter().map(|d| d.id).collect();
                assert_eq!(ids, vec![2, 1, 3]);
            }
            other => panic!("expected materialized result, got {other:?}"),
        }
    }

    #[test]
    fn test_relevance_ties_keep_pool_order() {
        let a = doc(1, None, Some("plan one"));
        let b = doc(2, None, Some("plan two"));
        let c = doc(3, None, Some("plan three"));
        let pool = [&a, &b, &c];
        let OrderedResult::Materialized(docs) = order(&pool, Some(OrderBy::Relevance), true, Some("plan")) else {
            panic!("expected materialized result");
        };
        assert_eq!(docs.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_relevance_without_text_is_pass_through() {
        let a = doc(1, None, None);
        let b = doc(2, None, None);
        let result = order(&[&a, &b], Some(OrderBy::Relevance), false, Some("  "));
        match result {
            OrderedResult::Deferred(q) => {
                assert_eq!(q.ids, vec![1, 2]);
                assert_eq!(q.sort, None);
            }
            other => panic!("expected deferred result, got {other:?}"),
        }
    }

    #[test]
    fn test_date_order_is_deferred() {
        let a = doc(1, Some(2020), None);
        let result = order(&[&a], Some(OrderBy::Date), true, Some("x"));
        assert!(!result.is_materialized());
    }
}
