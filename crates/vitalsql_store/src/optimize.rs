use std::collections::{BTreeSet, HashSet};

use vitalsql_core::{
    Comparator, ContainerKind, CriteriaContainer, CriteriaElement, Criterion, QueryValue,
    TypeCriterion, Value, VitalSqlError, VitalSqlResult, vocab,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimestampBound {
    pub value: i64,
    pub inclusive: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelFilter {
    pub comparator: Comparator,
    pub uris: Vec<String>,
}

/// Type, timestamp and channel criteria of an AND container merged into one predicate
/// over the per-row `vitaltype`, `tstamp` and `channeluri` columns.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TypeAndFold {
    pub types: Vec<String>,
    /// `true` restricts to `types`, `false` excludes them.
    pub include: bool,
    /// Inclusion sets with an empty intersection; the container cannot match anything.
    pub unsatisfiable: bool,
    pub min_timestamp: Option<TimestampBound>,
    pub max_timestamp: Option<TimestampBound>,
    pub channel: Option<ChannelFilter>,
    /// Element indices subsumed by the fold.
    pub covered: Vec<usize>,
    pub warnings: Vec<String>,
}

impl TypeAndFold {
    pub fn covers(&self, index: usize) -> bool {
        self.covered.contains(&index)
    }
}

pub fn fold_type_and(container: &CriteriaContainer) -> VitalSqlResult<Option<TypeAndFold>> {
    if container.kind != ContainerKind::And {
        return Ok(None);
    }
    let mut fold = TypeAndFold::default();
    let mut include: Option<bool> = None;
    let mut included: Option<BTreeSet<String>> = None;
    let mut excluded: BTreeSet<String> = BTreeSet::new();

    for (index, element) in container.elements.iter().enumerate() {
        let criterion = match element {
            CriteriaElement::Container(_) => return Ok(None),
            CriteriaElement::Criterion(criterion) => criterion,
        };
        match criterion {
            Criterion::Type(type_criterion) => {
                let inclusive = type_criterion.is_inclusive();
                match include {
                    None => include = Some(inclusive),
                    Some(current) if current != inclusive => {
                        return Err(VitalSqlError::query(
                            "mixed type constraint comparator in a container detected",
                        ));
                    }
                    Some(_) => {}
                }
                let types: BTreeSet<String> = type_criterion.types.iter().cloned().collect();
                if inclusive {
                    included = Some(match included {
                        None => types,
                        Some(current) => current.intersection(&types).cloned().collect(),
                    });
                } else {
                    excluded.extend(types);
                }
                fold.covered.push(index);
            }
            Criterion::Property(property) if property.property == vocab::HAS_CHANNEL_URI => {
                if fold.channel.is_some() {
                    fold.warnings.push("more than one channel uri criterion".to_string());
                    continue;
                }
                if !matches!(
                    property.comparator,
                    Comparator::Eq | Comparator::Ne | Comparator::OneOf | Comparator::NoneOf
                ) {
                    fold.warnings.push(format!(
                        "channel uri comparator unsupported: {}",
                        property.comparator
                    ));
                    continue;
                }
                let uris = property
                    .value
                    .as_ref()
                    .map(QueryValue::values)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                fold.channel = Some(ChannelFilter {
                    comparator: property.comparator,
                    uris,
                });
                fold.covered.push(index);
            }
            Criterion::Property(property) if property.property == vocab::HAS_TIMESTAMP => {
                let bound = property
                    .value
                    .as_ref()
                    .and_then(|value| value.values().first())
                    .and_then(timestamp_value);
                let Some(value) = bound else {
                    fold.warnings.push("timestamp criterion without numeric value".to_string());
                    continue;
                };
                let slot = match property.comparator {
                    Comparator::Ge | Comparator::Gt => &mut fold.min_timestamp,
                    Comparator::Le | Comparator::Lt => &mut fold.max_timestamp,
                    other => {
                        fold.warnings.push(format!(
                            "only range timestamp criteria are folded: {other}"
                        ));
                        continue;
                    }
                };
                if slot.is_some() {
                    fold.warnings
                        .push("more than one timestamp bound in the same direction".to_string());
                    continue;
                }
                *slot = Some(TimestampBound {
                    value,
                    inclusive: matches!(property.comparator, Comparator::Ge | Comparator::Le),
                });
                fold.covered.push(index);
            }
            Criterion::Property(_) => {}
        }
    }

    if fold.covered.is_empty() {
        return Ok(None);
    }
    for warning in &fold.warnings {
        log::warn!("type fold: {warning}");
    }
    fold.include = include.unwrap_or(false);
    if fold.include {
        let types = included.unwrap_or_default();
        fold.unsatisfiable = types.is_empty();
        fold.types = types.into_iter().collect();
    } else {
        fold.types = excluded.into_iter().collect();
    }
    Ok(Some(fold))
}

fn timestamp_value(value: &Value) -> Option<i64> {
    match value {
        Value::Long(value) | Value::Date(value) => Some(*value),
        Value::Integer(value) => Some(i64::from(*value)),
        _ => None,
    }
}

/// An OR container of at least two type-equality criteria becomes one ONE_OF criterion.
pub fn fold_type_or(container: &CriteriaContainer) -> Option<TypeCriterion> {
    if container.kind != ContainerKind::Or {
        return None;
    }
    let mut types = Vec::new();
    for element in &container.elements {
        match element {
            CriteriaElement::Criterion(Criterion::Type(criterion))
                if criterion.comparator == Comparator::Eq && !criterion.negated =>
            {
                types.extend(criterion.types.iter().cloned());
            }
            _ => return None,
        }
    }
    (types.len() >= 2).then(|| TypeCriterion::one_of(types))
}

/// An AND container made only of type-inequality criteria becomes one NONE_OF criterion.
pub fn fold_type_ne_and(container: &CriteriaContainer) -> Option<TypeCriterion> {
    if container.kind != ContainerKind::And {
        return None;
    }
    let mut types = Vec::new();
    for element in &container.elements {
        match element {
            CriteriaElement::Criterion(Criterion::Type(criterion))
                if (criterion.comparator == Comparator::Ne && !criterion.negated)
                    || (criterion.comparator == Comparator::Eq && criterion.negated) =>
            {
                types.extend(criterion.types.iter().cloned());
            }
            _ => return None,
        }
    }
    (!types.is_empty()).then(|| TypeCriterion::none_of(types))
}

/// Criteria of an AND container worth a `LIMIT 1` existence probe. Empty when fewer than
/// two distinct positive criteria exist.
pub fn probe_candidates(container: &CriteriaContainer) -> Vec<&Criterion> {
    if container.kind != ContainerKind::And {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for criterion in container.criteria() {
        if criterion.is_negated() {
            continue;
        }
        if let Criterion::Property(property) = criterion {
            if property.comparator.is_exclusive() {
                continue;
            }
            if !seen.insert(property.property.as_str()) {
                continue;
            }
        }
        candidates.push(criterion);
    }
    if candidates.len() < 2 {
        return Vec::new();
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalsql_core::PropertyCriterion;

    #[test]
    fn folds_types_timestamps_and_channels() {
        let container = CriteriaContainer::and(vec![
            TypeCriterion::one_of(vec!["urn:A".into(), "urn:B".into()]).into(),
            TypeCriterion::is("urn:B").into(),
            PropertyCriterion::new(vocab::HAS_TIMESTAMP, Comparator::Ge, 10_i64).into(),
            PropertyCriterion::new(vocab::HAS_TIMESTAMP, Comparator::Lt, 20_i64).into(),
            PropertyCriterion::new(vocab::HAS_CHANNEL_URI, Comparator::Eq, Value::Uri("urn:ch".into()))
                .into(),
            PropertyCriterion::new("urn:p", Comparator::Eq, 1).into(),
        ]);
        let fold = fold_type_and(&container).expect("fold").expect("applies");
        assert!(fold.include);
        assert_eq!(fold.types, vec!["urn:B".to_string()]);
        assert!(!fold.unsatisfiable);
        assert_eq!(
            fold.min_timestamp,
            Some(TimestampBound {
                value: 10,
                inclusive: true
            })
        );
        assert_eq!(
            fold.max_timestamp,
            Some(TimestampBound {
                value: 20,
                inclusive: false
            })
        );
        assert_eq!(fold.channel.as_ref().map(|c| c.uris.clone()), Some(vec!["urn:ch".to_string()]));
        assert_eq!(fold.covered, vec![0, 1, 2, 3, 4]);
        assert!(!fold.covers(5));
    }

    #[test]
    fn disjoint_inclusions_are_unsatisfiable() {
        let container = CriteriaContainer::and(vec![
            TypeCriterion::is("urn:A").into(),
            TypeCriterion::is("urn:B").into(),
        ]);
        let fold = fold_type_and(&container).expect("fold").expect("applies");
        assert!(fold.unsatisfiable);
    }

    #[test]
    fn exclusions_union() {
        let container = CriteriaContainer::and(vec![
            TypeCriterion::is_not("urn:A").into(),
            TypeCriterion::none_of(vec!["urn:B".into()]).into(),
        ]);
        let fold = fold_type_and(&container).expect("fold").expect("applies");
        assert!(!fold.include);
        assert_eq!(fold.types, vec!["urn:A".to_string(), "urn:B".to_string()]);
    }

    #[test]
    fn mixed_type_comparators_are_rejected() {
        let container = CriteriaContainer::and(vec![
            TypeCriterion::is("urn:A").into(),
            TypeCriterion::is_not("urn:B").into(),
        ]);
        assert!(fold_type_and(&container).is_err());
    }

    #[test]
    fn nested_containers_and_or_do_not_fold() {
        let nested = CriteriaContainer::and(vec![
            TypeCriterion::is("urn:A").into(),
            CriteriaContainer::or(vec![]).into(),
        ]);
        assert!(fold_type_and(&nested).expect("fold").is_none());
        let or = CriteriaContainer::or(vec![TypeCriterion::is("urn:A").into()]);
        assert!(fold_type_and(&or).expect("fold").is_none());
    }

    #[test]
    fn or_of_type_equalities_becomes_one_of() {
        let container = CriteriaContainer::or(vec![
            TypeCriterion::is("urn:A").into(),
            TypeCriterion::is("urn:B").into(),
        ]);
        let folded = fold_type_or(&container).expect("folded");
        assert_eq!(folded.comparator, Comparator::OneOf);
        assert_eq!(folded.types.len(), 2);
        let single = CriteriaContainer::or(vec![TypeCriterion::is("urn:A").into()]);
        assert!(fold_type_or(&single).is_none());
        let mixed = CriteriaContainer::or(vec![
            TypeCriterion::is("urn:A").into(),
            PropertyCriterion::new("urn:p", Comparator::Eq, 1).into(),
        ]);
        assert!(fold_type_or(&mixed).is_none());
    }

    #[test]
    fn and_of_type_inequalities_becomes_none_of() {
        let container = CriteriaContainer::and(vec![
            TypeCriterion::is_not("urn:A").into(),
            TypeCriterion::is("urn:B").negate().into(),
        ]);
        let folded = fold_type_ne_and(&container).expect("folded");
        assert_eq!(folded.comparator, Comparator::NoneOf);
        assert_eq!(folded.types, vec!["urn:A".to_string(), "urn:B".to_string()]);
    }

    #[test]
    fn probes_skip_exclusive_and_duplicate_criteria() {
        let container = CriteriaContainer::and(vec![
            PropertyCriterion::new("urn:p", Comparator::Eq, 1).into(),
            PropertyCriterion::new("urn:p", Comparator::Gt, 0).into(),
            PropertyCriterion::new("urn:q", Comparator::Ne, 1).into(),
            TypeCriterion::is("urn:A").into(),
        ]);
        assert_eq!(probe_candidates(&container).len(), 2);
        let lone = CriteriaContainer::and(vec![
            PropertyCriterion::new("urn:p", Comparator::Eq, 1).into(),
            PropertyCriterion::new("urn:q", Comparator::NotExists, 1).into(),
        ]);
        assert!(probe_candidates(&lone).is_empty());
    }
}
