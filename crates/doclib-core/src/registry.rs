//! Declarative field registry.
//!
//! Every filter key a request may carry is resolved here, once, into a
//! [`FilterField`]: a closed set of typed accessors over [`Document`].
//! Nothing downstream dispatches on attribute-name strings.
//!
//! | Key shape | Variant | Example |
//! |-----------|---------|---------|
//! | plain attribute | [`FilterField::Scalar`] | `type_of_record` |
//! | tag category | [`FilterField::Tag`] | `key_topics` |
//! | `entity.field` | [`FilterField::Linked`] | `author.id`, `funder.name` |
//! | `years` | [`FilterField::Years`] | `years` |

use std::borrow::Cow;

use crate::models::{Document, TagCategory};

/// Synthetic filter key with year-range semantics.
pub const YEARS_KEY: &str = "years";

/// Plain document attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarField {
    Id,
    Title,
    Description,
    TypeOfRecord,
    Link,
    DateType,
    SubOrganizations,
}

impl ScalarField {
    /// String-cast value of this attribute, `None` when unset.
    pub fn value<'a>(&self, doc: &'a Document) -> Option<Cow<'a, str>> {
        match self {
            ScalarField::Id => Some(Cow::Owned(doc.id.to_string())),
            ScalarField::Title => doc.title.as_deref().map(Cow::Borrowed),
            ScalarField::Description => doc.description.as_deref().map(Cow::Borrowed),
            ScalarField::TypeOfRecord => doc.type_of_record.as_deref().map(Cow::Borrowed),
            ScalarField::Link => doc.link.as_deref().map(Cow::Borrowed),
            ScalarField::DateType => Some(Cow::Borrowed(doc.date_type.as_str())),
            ScalarField::SubOrganizations => doc.sub_organizations.as_deref().map(Cow::Borrowed),
        }
    }
}

/// Attribute of an entity joined many-to-many to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkedField {
    AuthorId,
    AuthorOrganization,
    AuthorAcronym,
    AuthorType,
    AuthorInternationalNational,
    AuthorCountry,
    AuthorIso2,
    FunderId,
    FunderName,
    EventId,
    EventName,
    EventMasterId,
}

impl LinkedField {
    /// String-cast attribute of every linked instance, in link order.
    pub fn values<'a>(&self, doc: &'a Document) -> Vec<Option<Cow<'a, str>>> {
        fn opt(v: &Option<String>) -> Option<Cow<'_, str>> {
            v.as_deref().map(Cow::Borrowed)
        }
        match self {
            LinkedField::AuthorId => doc
                .authors
                .iter()
                .map(|a| Some(Cow::Owned(a.id.to_string())))
                .collect(),
            LinkedField::AuthorOrganization => doc
                .authors
                .iter()
                .map(|a| Some(Cow::Borrowed(a.authoring_organization.as_str())))
                .collect(),
            LinkedField::AuthorAcronym => doc.authors.iter().map(|a| opt(&a.acronym)).collect(),
            LinkedField::AuthorType => doc
                .authors
                .iter()
                .map(|a| opt(&a.type_of_authoring_organization))
                .collect(),
            LinkedField::AuthorInternationalNational => doc
                .authors
                .iter()
                .map(|a| opt(&a.international_national))
                .collect(),
            LinkedField::AuthorCountry => doc.authors.iter().map(|a| opt(&a.country)).collect(),
            LinkedField::AuthorIso2 => doc.authors.iter().map(|a| opt(&a.iso2)).collect(),
            LinkedField::FunderId => doc
                .funders
                .iter()
                .map(|f| Some(Cow::Owned(f.id.to_string())))
                .collect(),
            LinkedField::FunderName => doc
                .funders
                .iter()
                .map(|f| Some(Cow::Borrowed(f.name.as_str())))
                .collect(),
            LinkedField::EventId => doc
                .events
                .iter()
                .map(|e| Some(Cow::Owned(e.id.to_string())))
                .collect(),
            LinkedField::EventName => doc
                .events
                .iter()
                .map(|e| Some(Cow::Borrowed(e.name.as_str())))
                .collect(),
            LinkedField::EventMasterId => doc
                .events
                .iter()
                .map(|e| Some(Cow::Borrowed(e.master_id.as_str())))
                .collect(),
        }
    }
}

/// A resolved filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Scalar(ScalarField),
    Tag(TagCategory),
    Linked(LinkedField),
    Years,
}

const REGISTRY: &[(&str, FilterField)] = &[
    ("id", FilterField::Scalar(ScalarField::Id)),
    ("title", FilterField::Scalar(ScalarField::Title)),
    ("description", FilterField::Scalar(ScalarField::Description)),
    ("type_of_record", FilterField::Scalar(ScalarField::TypeOfRecord)),
    ("link", FilterField::Scalar(ScalarField::Link)),
    ("date_type", FilterField::Scalar(ScalarField::DateType)),
    ("sub_organizations", FilterField::Scalar(ScalarField::SubOrganizations)),
    ("key_topics", FilterField::Tag(TagCategory::KeyTopics)),
    ("covid_tags", FilterField::Tag(TagCategory::CovidTags)),
    ("author.id", FilterField::Linked(LinkedField::AuthorId)),
    ("author.authoring_organization", FilterField::Linked(LinkedField::AuthorOrganization)),
    ("author.acronym", FilterField::Linked(LinkedField::AuthorAcronym)),
    ("author.type_of_authoring_organization", FilterField::Linked(LinkedField::AuthorType)),
    ("author.international_national", FilterField::Linked(LinkedField::AuthorInternationalNational)),
    ("author.country", FilterField::Linked(LinkedField::AuthorCountry)),
    ("author.iso2", FilterField::Linked(LinkedField::AuthorIso2)),
    ("funder.id", FilterField::Linked(LinkedField::FunderId)),
    ("funder.name", FilterField::Linked(LinkedField::FunderName)),
    ("event.id", FilterField::Linked(LinkedField::EventId)),
    ("event.name", FilterField::Linked(LinkedField::EventName)),
    ("event.master_id", FilterField::Linked(LinkedField::EventMasterId)),
    (YEARS_KEY, FilterField::Years),
];

impl FilterField {
    /// Resolve a filter key, `None` if the key names no known field.
    pub fn resolve(key: &str) -> Option<FilterField> {
        REGISTRY
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, field)| *field)
    }

    /// The canonical filter key for this field.
    pub fn key(&self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, field)| field == self)
            .map(|(name, _)| *name)
            .unwrap_or(YEARS_KEY)
    }

    /// All keys accepted by [`resolve`](FilterField::resolve).
    pub fn known_keys() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(name, _)| *name)
    }
}
