//! Candidate selection for lookup queries.
//!
//! A lookup query lists every candidate from the control plane and then
//! narrows the set down locally: an optional direct identifier, a set of
//! field filters, and an optional most-recent tie-break. Filtering is a
//! pure function of the candidate set; only an exact tie on the recency
//! key falls back to listing order, keeping the candidate listed first.

use std::collections::HashMap;

use regex::Regex;

use crate::error::SelectError;

/// A single field filter from a lookup query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Field name, e.g. `"os_type"` or `"label"`.
    pub name: String,
    /// Value to match the field against.
    pub value: String,
}

impl Filter {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// How a candidate exposes one of its filterable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// Matched by string equality.
    Exact(&'a str),
    /// Matched as a regular expression over the field value.
    Pattern(&'a str),
}

/// A candidate that lookup queries can filter and tie-break over.
pub trait Selectable {
    /// The candidate's identifier.
    fn id(&self) -> &str;

    /// A sortable recency key, typically an archiving timestamp.
    ///
    /// Candidates without a meaningful timestamp return
    /// [`RECENCY_SENTINEL`].
    fn recency(&self) -> &str {
        RECENCY_SENTINEL
    }

    /// Look up a filterable field by name.
    ///
    /// Returns `None` for names that are not filterable on this
    /// candidate type; selection treats that as an invalid query rather
    /// than a non-match.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

/// Recency key for candidates that carry no timestamp.
///
/// Compares greater than any ISO-8601 date under lexicographic ordering,
/// so dated candidates always win the most-recent tie-break and undated
/// ones only surface when nothing dated matched.
pub const RECENCY_SENTINEL: &str = "ZZZ";

/// Narrow `candidates` down to exactly one.
///
/// A `direct_id` short-circuits everything else: the candidate with that
/// identifier is returned and filters are not evaluated. Otherwise every
/// filter must hold on a candidate for it to survive; if more than one
/// survives, `most_recent` picks the one whose recency key compares
/// strictly smallest, so an exact tie on the key keeps the candidate
/// listed first.
///
/// # Errors
///
/// Returns [`SelectError::NoMatch`] when nothing survives,
/// [`SelectError::Ambiguous`] when more than one does and `most_recent`
/// is not set, [`SelectError::InvalidFilter`] for unknown field names,
/// and [`SelectError::InvalidPattern`] for label patterns that fail to
/// compile.
pub fn select<'a, T: Selectable>(
    candidates: &'a [T],
    direct_id: Option<&str>,
    filters: &[Filter],
    most_recent: bool,
) -> Result<&'a T, SelectError> {
    if let Some(wanted) = direct_id {
        return candidates
            .iter()
            .find(|c| c.id() == wanted)
            .ok_or(SelectError::NoMatch);
    }

    // Compile each pattern once even when many candidates share it.
    let mut patterns: HashMap<&str, Regex> = HashMap::new();

    let mut survivors: Vec<&T> = Vec::new();
    'candidates: for candidate in candidates {
        for filter in filters {
            let value = candidate
                .field(&filter.name)
                .ok_or_else(|| SelectError::InvalidFilter(filter.name.clone()))?;
            let matched = match value {
                FieldValue::Exact(actual) => actual == filter.value,
                FieldValue::Pattern(actual) => {
                    use std::collections::hash_map::Entry;
                    let re = match patterns.entry(filter.value.as_str()) {
                        Entry::Occupied(entry) => entry.into_mut(),
                        Entry::Vacant(slot) => {
                            let compiled = Regex::new(&filter.value).map_err(|source| {
                                SelectError::InvalidPattern {
                                    name: filter.name.clone(),
                                    source,
                                }
                            })?;
                            slot.insert(compiled)
                        }
                    };
                    re.is_match(actual)
                }
            };
            if !matched {
                continue 'candidates;
            }
        }
        survivors.push(candidate);
    }

    match survivors.as_slice() {
        [] => Err(SelectError::NoMatch),
        [only] => Ok(*only),
        many if most_recent => {
            let mut best = many[0];
            for &candidate in &many[1..] {
                if candidate.recency() < best.recency() {
                    best = candidate;
                }
            }
            Ok(best)
        }
        _ => Err(SelectError::Ambiguous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Image {
        id: &'static str,
        archived_at: &'static str,
        os_type: &'static str,
        label: &'static str,
    }

    impl Selectable for Image {
        fn id(&self) -> &str {
            self.id
        }

        fn recency(&self) -> &str {
            self.archived_at
        }

        fn field(&self, name: &str) -> Option<FieldValue<'_>> {
            match name {
                "os_type" => Some(FieldValue::Exact(self.os_type)),
                "label" => Some(FieldValue::Pattern(self.label)),
                _ => None,
            }
        }
    }

    fn images() -> Vec<Image> {
        vec![
            Image {
                id: "img-a",
                archived_at: "2019-08-01",
                os_type: "Linux",
                label: "web frontend",
            },
            Image {
                id: "img-b",
                archived_at: "2019-06-01",
                os_type: "Linux",
                label: "web backend",
            },
            Image {
                id: "img-c",
                archived_at: RECENCY_SENTINEL,
                os_type: "Windows",
                label: "ad controller",
            },
        ]
    }

    #[test]
    fn direct_id_skips_filters() {
        let pool = images();
        // The filter would exclude img-c, but the direct id wins.
        let picked = select(
            &pool,
            Some("img-c"),
            &[Filter::new("os_type", "Linux")],
            false,
        )
        .unwrap();
        assert_eq!(picked.id, "img-c");
    }

    #[test]
    fn single_survivor_needs_no_tie_break() {
        let pool = images();
        let picked = select(&pool, None, &[Filter::new("label", "backend")], false).unwrap();
        assert_eq!(picked.id, "img-b");
    }

    #[test]
    fn ambiguous_without_most_recent() {
        let pool = images();
        let err = select(&pool, None, &[Filter::new("os_type", "Linux")], false).unwrap_err();
        assert!(matches!(err, SelectError::Ambiguous));
    }

    #[test]
    fn most_recent_picks_smallest_recency_key() {
        let pool = images();
        let picked = select(&pool, None, &[Filter::new("os_type", "Linux")], true).unwrap();
        assert_eq!(picked.id, "img-b");
    }

    #[test]
    fn undated_candidate_loses_tie_break_to_dated_one() {
        let pool = images();
        let picked = select(&pool, None, &[Filter::new("label", "end|controller")], true).unwrap();
        assert_ne!(picked.id, "img-c");
    }

    #[test]
    fn equal_recency_keys_keep_the_first_listed_candidate() {
        let pool = vec![
            Image {
                id: "img-a",
                archived_at: "2019-06-01",
                os_type: "Linux",
                label: "web frontend",
            },
            Image {
                id: "img-b",
                archived_at: "2019-06-01",
                os_type: "Linux",
                label: "web backend",
            },
        ];
        let picked = select(&pool, None, &[Filter::new("os_type", "Linux")], true).unwrap();
        assert_eq!(picked.id, "img-a");
    }

    #[test]
    fn result_does_not_depend_on_candidate_order() {
        let mut pool = images();
        let forward = select(&pool, None, &[Filter::new("os_type", "Linux")], true)
            .unwrap()
            .id;
        pool.reverse();
        let reversed = select(&pool, None, &[Filter::new("os_type", "Linux")], true)
            .unwrap()
            .id;
        assert_eq!(forward, reversed);
    }

    #[test]
    fn unknown_field_aborts_the_query() {
        let pool = images();
        let err = select(&pool, None, &[Filter::new("color", "blue")], false).unwrap_err();
        assert!(matches!(err, SelectError::InvalidFilter(name) if name == "color"));
    }

    #[test]
    fn bad_pattern_is_reported_with_the_filter_name() {
        let pool = images();
        let err = select(&pool, None, &[Filter::new("label", "([")], false).unwrap_err();
        assert!(matches!(err, SelectError::InvalidPattern { name, .. } if name == "label"));
    }

    #[test]
    fn empty_pool_is_no_match() {
        let pool: Vec<Image> = Vec::new();
        assert!(matches!(
            select(&pool, None, &[], false),
            Err(SelectError::NoMatch)
        ));
        assert!(matches!(
            select(&pool, Some("img-a"), &[], false),
            Err(SelectError::NoMatch)
        ));
    }
}
