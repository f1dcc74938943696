//! Behavioural properties of the search engine over generated corpora.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use doclib_core::facets::{count_category, compute_facet_counts, FACET_CATEGORIES, NULL_TOKEN};
use doclib_core::filter::{apply, CompiledFilter, FilterSpec};
use doclib_core::models::{Author, Document, Event, Funder, Tag, TagCategory};
use doclib_core::ordering::{compare_documents, order, OrderBy, OrderedResult, SortKey};
use doclib_core::paginate::{paginate, PageRequest};
use doclib_core::registry::FilterField;
use doclib_core::service::{SearchRequest, SearchResponse, SearchService};
use doclib_core::store::memory::InMemoryStore;
use doclib_core::store::DocumentQuery;
use proptest::prelude::*;

const TITLES: &[&str] = &["Alpha", "beta review", "Pandemic plan", "pandemic annex", "Zeta"];
const RECORDS: &[&str] = &["Report", "Journal paper"];
const AUTHOR_TYPES: &[&str] = &["Academic", "Private sector", "Other"];
const TOPICS: &[&str] = &["Strategic planning", "Health systems"];
const COVID_TAGS: &[&str] = &["Vaccination", "Testing"];
const FUNDERS: &[&str] = &["Gates Foundation", "Wellcome Trust"];
const EVENTS: &[&str] = &["Ebola 2014", "COVID-19", "Zika 2016"];

/// Per document: year, title, record type, author indexes, key topic
/// indexes, covid tag indexes, funder indexes, event indexes.
type Shape = (
    Option<i32>,
    Option<usize>,
    Option<usize>,
    Vec<usize>,
    Vec<usize>,
    Vec<usize>,
    Vec<usize>,
    Vec<usize>,
);

fn build(shapes: Vec<Shape>) -> Vec<Document> {
    shapes
        .into_iter()
        .enumerate()
        .map(|(i, (year, title, record, authors, topics, covid, funders, events))| {
            let mut doc = Document::new(i as i64 + 1);
            doc.date = year.and_then(|y| NaiveDate::from_ymd_opt(y, 6, 15));
            doc.title = title.map(|t| TITLES[t].to_string());
            doc.type_of_record = record.map(|r| RECORDS[r].to_string());
            for a in authors {
                if doc.authors.iter().any(|x| x.id == a as i64) {
                    continue;
                }
                doc.authors.push(Author {
                    id: a as i64,
                    authoring_organization: format!("Org {a}"),
                    acronym: None,
                    type_of_authoring_organization: Some(AUTHOR_TYPES[a].to_string()),
                    international_national: None,
                    country: None,
                    iso2: None,
                });
            }
            for t in topics {
                if doc.tags.iter().any(|x| x.id == t as i64) {
                    continue;
                }
                doc.tags.push(Tag {
                    id: t as i64,
                    name: TOPICS[t].to_string(),
                    category: TagCategory::KeyTopics,
                });
            }
            for c in covid {
                let id = 100 + c as i64;
                if doc.tags.iter().any(|x| x.id == id) {
                    continue;
                }
                doc.tags.push(Tag {
                    id,
                    name: COVID_TAGS[c].to_string(),
                    category: TagCategory::CovidTags,
                });
            }
            for f in funders {
                if doc.funders.iter().any(|x| x.id == f as i64) {
                    continue;
                }
                doc.funders.push(Funder {
                    id: f as i64,
                    name: FUNDERS[f].to_string(),
                });
            }
            for e in events {
                if doc.events.iter().any(|x| x.id == e as i64) {
                    continue;
                }
                doc.events.push(Event {
                    id: e as i64,
                    master_id: format!("event-{e}"),
                    name: EVENTS[e].to_string(),
                });
            }
            doc.search_text = doc.title.clone().unwrap_or_default().to_lowercase();
            doc
        })
        .collect()
}

fn corpus() -> impl Strategy<Value = Vec<Document>> {
    prop::collection::vec(
        (
            prop::option::of(2017i32..2023),
            prop::option::of(0..TITLES.len()),
            prop::option::of(0..RECORDS.len()),
            prop::collection::vec(0..AUTHOR_TYPES.len(), 0..3),
            prop::collection::vec(0..TOPICS.len(), 0..2),
            prop::collection::vec(0..COVID_TAGS.len(), 0..2),
            prop::collection::vec(0..FUNDERS.len(), 0..2),
            prop::collection::vec(0..EVENTS.len(), 0..2),
        ),
        0..30,
    )
    .prop_map(build)
}

/// One active clause: (key, values).
fn clause() -> impl Strategy<Value = (String, Vec<String>)> {
    prop_oneof![
        prop::collection::vec((2017i32..2023).prop_map(|y| y.to_string()), 1..3)
            .prop_map(|v| ("years".to_string(), v)),
        (prop::option::of(2016i32..2021), prop::option::of(2019i32..2024)).prop_map(|(s, e)| {
            let bound = |b: Option<i32>| b.map_or("null".to_string(), |b| b.to_string());
            ("years".to_string(), vec![format!("range_{}_{}", bound(s), bound(e))])
        }),
        prop::sample::subsequence(RECORDS.to_vec(), 1..=RECORDS.len()).prop_map(|v| (
            "type_of_record".to_string(),
            v.into_iter().map(String::from).collect()
        )),
        prop::sample::subsequence(AUTHOR_TYPES.to_vec(), 1..=2).prop_map(|v| (
            "author.type_of_authoring_organization".to_string(),
            v.into_iter().map(String::from).collect()
        )),
        prop::sample::subsequence(TOPICS.to_vec(), 1..=1).prop_map(|v| (
            "key_topics".to_string(),
            v.into_iter().map(String::from).collect()
        )),
    ]
}

fn spec_of(clauses: &[(String, Vec<String>)]) -> FilterSpec {
    clauses.iter().cloned().collect()
}

fn ids(docs: &[&Document]) -> Vec<i64> {
    docs.iter().map(|d| d.id).collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// Values a request could select for the facet category filtered by `key`.
fn selectable_values(key: &str) -> Vec<String> {
    let owned = |values: &[&str]| -> Vec<String> { values.iter().map(|v| v.to_string()).collect() };
    match key {
        "years" => (2017..2023).map(|y| y.to_string()).collect(),
        "event.name" => owned(EVENTS),
        "key_topics" => owned(TOPICS),
        "covid_tags" => owned(COVID_TAGS),
        "author.id" => (0..AUTHOR_TYPES.len()).map(|a| a.to_string()).collect(),
        "author.type_of_authoring_organization" => owned(AUTHOR_TYPES),
        "funder.name" => owned(FUNDERS),
        "type_of_record" => owned(RECORDS),
        other => panic!("no selectable values for facet filter {other}"),
    }
}

fn compiles(clause: &(String, Vec<String>)) -> bool {
    CompiledFilter::compile(&spec_of(std::slice::from_ref(clause))).is_ok()
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, ..ProptestConfig::default() })]

    #[test]
    fn prop_filters_commute(docs in corpus(), a in clause(), b in clause()) {
        prop_assume!(a.0 != b.0);
        prop_assume!(compiles(&a) && compiles(&b));
        let fa = CompiledFilter::compile(&spec_of(&[a.clone()])).unwrap();
        let fb = CompiledFilter::compile(&spec_of(&[b.clone()])).unwrap();
        let both = CompiledFilter::compile(&spec_of(&[a, b])).unwrap();

        let ab = apply(apply(&docs, &fa, None), &fb, None);
        let ba = apply(apply(&docs, &fb, None), &fa, None);
        let at_once = apply(&docs, &both, None);
        prop_assert_eq!(ids(&ab), ids(&ba));
        prop_assert_eq!(ids(&ab), ids(&at_once));
    }

    #[test]
    fn prop_facet_counts_ignore_own_selection(
        docs in corpus(),
        other in clause(),
        picks_a in prop::collection::vec(any::<prop::sample::Index>(), 1..3),
        picks_b in prop::collection::vec(any::<prop::sample::Index>(), 1..3),
        drop_nulls in any::<bool>(),
    ) {
        prop_assume!(compiles(&other));
        let exclude: HashSet<String> = if drop_nulls {
            HashSet::from([NULL_TOKEN.to_string()])
        } else {
            HashSet::new()
        };

        for category in FACET_CATEGORIES {
            let key = category.filter.key();
            if other.0 == key {
                continue;
            }
            let selectable = selectable_values(key);
            let counts_with = |picks: &[prop::sample::Index]| {
                let own: Vec<String> = picks.iter().map(|i| i.get(&selectable).clone()).collect();
                let spec = spec_of(&[other.clone(), (key.to_string(), own)]);
                let filter = CompiledFilter::compile(&spec).unwrap();
                assert!(filter.constrains(category.filter));
                let base = apply(&docs, &filter, None);
                compute_facet_counts(&base, &docs, &filter, None, &exclude)
            };
            let a = counts_with(&picks_a);
            let b = counts_with(&picks_b);
            prop_assert_eq!(&a[category.key], &b[category.key], "category {}", category.key);

            // same as counting over everything except the category's own clause
            let relaxed = CompiledFilter::compile(&spec_of(&[other.clone()])).unwrap();
            let pool = apply(&docs, &relaxed, None);
            let expected = count_category(&pool, category.source, &exclude);
            prop_assert_eq!(&a[category.key], &expected, "category {}", category.key);
        }
    }

    #[test]
    fn prop_pagination_paths_agree(
        docs in corpus(),
        page_size in 1i64..7,
        sort in prop::option::of(prop_oneof![Just(SortKey::Date), Just(SortKey::Title)]),
        descending in any::<bool>(),
    ) {
        let store = InMemoryStore::with_documents(docs);
        let rt = runtime();
        let snapshot = rt.block_on(doclib_core::store::DocumentStore::snapshot(&store)).unwrap();
        let all: Vec<i64> = snapshot.documents.iter().map(|d| d.id).collect();
        let query = DocumentQuery {
            ids: all,
            sort,
            descending,
            generation: None,
        };
        let materialized: Vec<Document> = query.evaluate(&snapshot).into_iter().cloned().collect();

        let pages = (snapshot.len() as i64 / page_size) + 2;
        for page in 1..=pages {
            let request = PageRequest::new(page, page_size).unwrap();
            let deferred = rt
                .block_on(paginate(&store, OrderedResult::Deferred(query.clone()), request))
                .unwrap();
            let listed = rt
                .block_on(paginate(&store, OrderedResult::Materialized(materialized.clone()), request))
                .unwrap();
            prop_assert_eq!(deferred, listed);
        }
    }

    #[test]
    fn prop_nulls_sort_last(docs in corpus(), descending in any::<bool>()) {
        for key in [SortKey::Date, SortKey::Title] {
            let mut sorted: Vec<&Document> = docs.iter().collect();
            sorted.sort_by(|a, b| compare_documents(a, b, key, descending));
            let is_null = |d: &&Document| match key {
                SortKey::Date => d.date.is_none(),
                SortKey::Title => d.title.is_none(),
            };
            let first_null = sorted.iter().position(is_null).unwrap_or(sorted.len());
            prop_assert!(sorted[first_null..].iter().all(is_null));
        }
    }

    #[test]
    fn prop_search_is_idempotent(docs in corpus(), a in clause(), text in prop::option::of("[a-z]{0,4}")) {
        prop_assume!(compiles(&a));
        let service = SearchService::new(Arc::new(InMemoryStore::with_documents(docs)));
        let request = SearchRequest {
            filters: spec_of(&[a]),
            search_text: text,
            order_by: Some(OrderBy::Relevance),
            explain_results: true,
            ..Default::default()
        };
        let rt = runtime();
        let first = rt.block_on(service.search(&request)).unwrap();
        let second = rt.block_on(service.search(&request)).unwrap();
        prop_assert_eq!(first, second);
    }
}

fn example_docs() -> Vec<Document> {
    let mut a = Document::new(1);
    a.date = NaiveDate::from_ymd_opt(2020, 1, 1);
    a.title = Some("Pandemic plan".into());
    a.search_text = "pandemic plan".into();
    let mut b = Document::new(2);
    b.date = NaiveDate::from_ymd_opt(2019, 1, 1);
    b.title = Some("Outbreak report".into());
    b.search_text = "outbreak report".into();
    let mut c = Document::new(3);
    c.title = Some("Draft".into());
    c.search_text = "draft".into();
    let mut d = Document::new(4);
    d.date = NaiveDate::from_ymd_opt(2018, 1, 1);
    d.title = Some("Budget".into());
    d.description = Some("Pandemic spending".into());
    d.search_text = "budget pandemic spending".into();
    vec![a, b, c, d]
}

#[tokio::test]
async fn test_date_ordering_example() {
    let store = InMemoryStore::with_documents(example_docs().into_iter().take(3).collect());
    let service = SearchService::new(Arc::new(store));
    for (descending, expected) in [(true, vec![1, 2, 3]), (false, vec![2, 1, 3])] {
        let request = SearchRequest {
            order_by: Some(OrderBy::Date),
            is_desc: descending,
            ..Default::default()
        };
        let response = service.search(&request).await.unwrap();
        let SearchResponse::Results(r) = response.as_ref() else {
            panic!("expected results");
        };
        assert_eq!(r.data.iter().map(|d| d.id).collect::<Vec<_>>(), expected);
    }
}

#[test]
fn test_open_year_range_example() {
    let docs = example_docs();
    let mut spec = FilterSpec::new();
    spec.insert("years".into(), vec!["range_2019_null".into()]);
    let filter = CompiledFilter::compile(&spec).unwrap();
    assert_eq!(ids(&apply(&docs, &filter, None)), vec![1, 2]);
}

#[test]
fn test_relevance_example() {
    let docs = example_docs();
    let filtered = apply(&docs, &CompiledFilter::default(), Some("pandemic"));
    let OrderedResult::Materialized(ranked) = order(&filtered, Some(OrderBy::Relevance), false, Some("pandemic"))
    else {
        panic!("relevance with text materializes");
    };
    assert_eq!(ranked.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 4]);
}

#[test]
fn test_years_facet_example() {
    let docs = example_docs();
    let mut spec = FilterSpec::new();
    spec.insert("years".into(), vec!["2019".into()]);
    let filter = CompiledFilter::compile(&spec).unwrap();
    assert!(filter.constrains(FilterField::Years));
    let base = apply(&docs, &filter, None);
    let counts = compute_facet_counts(&base, &docs, &filter, None, &HashSet::new());
    assert_eq!(counts["years"].count_of(Some("2020")), 1);
    assert_eq!(counts["years"].count_of(Some("2019")), 1);
    assert_eq!(counts["years"].count_of(None), 1);
    // every other category sees only the 2019 document
    assert_eq!(counts["types_of_record"].unique, 1);
}
