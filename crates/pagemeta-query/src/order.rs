//! Order-by plans.
//!
//! Grammar: comma-separated `<identifier> [asc|desc]`, default `asc`. An
//! identifier ending in `_lower` sorts its base identifier case-insensitively
//! (`linktext_lower` orders by `linktext` ignoring case).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use pagemeta_core::{Error, MetadataEntry, PropertyValue, Result};

use crate::criteria::{is_identifier, resolve_target, Target};

const LOWER_SUFFIX: &str = "_lower";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub target: Target,
    pub descending: bool,
    pub case_insensitive: bool,
}

/// Comparable value extracted from an entry for one clause.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Number(f64),
    Date(DateTime<Utc>),
    Text(String),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            SortValue::Number(_) => 0,
            SortValue::Date(_) => 1,
            SortValue::Text(_) => 2,
        }
    }

    fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Date(a), SortValue::Date(b)) => a.cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Parsed multi-clause ordering with left-to-right tie-breaking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    pub clauses: Vec<OrderClause>,
}

impl OrderBy {
    /// Parse an order-by string. Blank input yields no clauses.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }

        let clauses = input
            .split(',')
            .map(|part| parse_clause(input, part.trim()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Sort keys for one entry, one slot per clause.
    pub fn key(&self, entry: &MetadataEntry) -> Vec<Option<SortValue>> {
        self.clauses.iter().map(|c| c.value(entry)).collect()
    }

    /// Compare two key vectors produced by [`OrderBy::key`].
    ///
    /// Missing values sort after present ones ascending and before them
    /// descending.
    pub fn compare_keys(&self, a: &[Option<SortValue>], b: &[Option<SortValue>]) -> Ordering {
        for (clause, (x, y)) in self.clauses.iter().zip(a.iter().zip(b.iter())) {
            let ordering = match (x, y) {
                (Some(x), Some(y)) => x.compare(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = if clause.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Sort entries by this plan, breaking remaining ties by `pagepath`.
    pub fn sort(&self, entries: Vec<MetadataEntry>) -> Vec<MetadataEntry> {
        let mut keyed: Vec<(Vec<Option<SortValue>>, MetadataEntry)> =
            entries.into_iter().map(|e| (self.key(&e), e)).collect();
        keyed.sort_by(|(ka, a), (kb, b)| {
            self.compare_keys(ka, kb)
                .then_with(|| a.pagepath.cmp(&b.pagepath))
        });
        keyed.into_iter().map(|(_, e)| e).collect()
    }
}

impl OrderClause {
    fn value(&self, entry: &MetadataEntry) -> Option<SortValue> {
        let value = match &self.target {
            Target::Field(field) => SortValue::Text(entry.field(*field).to_string()),
            Target::Property(name) => match entry.first_value(name)? {
                PropertyValue::String(s) | PropertyValue::Text(s) => SortValue::Text(s.clone()),
                PropertyValue::Number(n) => SortValue::Number(*n),
                PropertyValue::Date(d) => SortValue::Date(*d),
            },
        };
        match value {
            SortValue::Text(s) if self.case_insensitive => Some(SortValue::Text(s.to_lowercase())),
            other => Some(other),
        }
    }
}

fn parse_clause(input: &str, part: &str) -> Result<OrderClause> {
    let mut words = part.split_whitespace();
    let ident = words
        .next()
        .ok_or_else(|| Error::malformed(input, "empty order-by clause"))?;
    if !is_identifier(ident) {
        return Err(Error::malformed(
            input,
            format!("invalid order-by identifier '{}'", ident),
        ));
    }

    let descending = match words.next() {
        None => false,
        Some(dir) if dir.eq_ignore_ascii_case("asc") => false,
        Some(dir) if dir.eq_ignore_ascii_case("desc") => true,
        Some(dir) => {
            return Err(Error::malformed(
                input,
                format!("invalid sort direction '{}'", dir),
            ))
        }
    };
    if words.next().is_some() {
        return Err(Error::malformed(input, "unexpected trailing tokens"));
    }

    let (base, case_insensitive) = match ident.strip_suffix(LOWER_SUFFIX) {
        Some(base) if !base.is_empty() => (base, true),
        _ => (ident, false),
    };

    Ok(OrderClause {
        target: resolve_target(base),
        descending,
        case_insensitive,
    })
}
