use std::collections::HashMap;

use vitalsql_core::{
    Comparator, CriteriaContainer, CriteriaElement, Criterion, PropertyCriterion, QueryValue,
    Registry, TypeCriterion, ValueKind, VitalSqlError, VitalSqlResult, vocab,
};

/// Rewrites a criteria tree into the form the optimizer and compiler expect: no negated
/// criteria, hierarchy expansions resolved, no redundant single-element containers.
pub struct Normalizer<'a> {
    registry: &'a Registry,
    expanded_types: HashMap<String, Vec<String>>,
    expanded_properties: HashMap<String, Vec<String>>,
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            expanded_types: HashMap::new(),
            expanded_properties: HashMap::new(),
        }
    }

    pub fn normalize(&mut self, container: &CriteriaContainer) -> VitalSqlResult<CriteriaContainer> {
        let resolved = self.eliminate_negation(container)?;
        let expanded = self.expand(&resolved)?;
        let lifted = lift_single_child(expanded);
        Ok(unwrap_singletons(lifted))
    }

    fn eliminate_negation(&self, container: &CriteriaContainer) -> VitalSqlResult<CriteriaContainer> {
        let mut elements = Vec::with_capacity(container.elements.len());
        for element in &container.elements {
            elements.push(match element {
                CriteriaElement::Container(child) => {
                    CriteriaElement::Container(self.eliminate_negation(child)?)
                }
                CriteriaElement::Criterion(Criterion::Property(criterion)) => {
                    CriteriaElement::Criterion(Criterion::Property(self.resolve_property(criterion)?))
                }
                CriteriaElement::Criterion(Criterion::Type(criterion)) => {
                    CriteriaElement::Criterion(Criterion::Type(resolve_type(criterion)?))
                }
            });
        }
        Ok(CriteriaContainer {
            kind: container.kind,
            elements,
        })
    }

    fn resolve_property(&self, criterion: &PropertyCriterion) -> VitalSqlResult<PropertyCriterion> {
        let mut resolved = criterion.clone();
        if resolved.property == vocab::URI {
            resolved.property = vocab::URI_PROP.to_string();
        }
        let comparator = resolved.comparator;
        if let Some(def) = self.registry.property(&resolved.property) {
            if def.multi_valued {
                let string_contains = def.kind == ValueKind::String
                    && matches!(
                        comparator,
                        Comparator::ContainsCaseInsensitive | Comparator::ContainsCaseSensitive
                    );
                let contains = matches!(comparator, Comparator::Contains | Comparator::NotContains);
                if !string_contains && !contains {
                    return Err(VitalSqlError::query(format!(
                        "multi-valued property {} may only be queried with CONTAINS/NOT_CONTAINS, or CONTAINS_CASE_INSENSITIVE/CONTAINS_CASE_SENSITIVE for strings",
                        resolved.property
                    )));
                }
            } else if matches!(comparator, Comparator::Contains | Comparator::NotContains) {
                return Err(VitalSqlError::query(format!(
                    "CONTAINS/NOT_CONTAINS may only be used with multi-valued properties: {}",
                    resolved.property
                )));
            }
        }
        if resolved.negated {
            resolved.comparator = comparator.negated().ok_or_else(|| {
                VitalSqlError::query(format!("no corresponding negated comparator for {comparator}"))
            })?;
            resolved.negated = false;
        }
        validate_value(&resolved)?;
        Ok(resolved)
    }

    fn expand(&mut self, container: &CriteriaContainer) -> VitalSqlResult<CriteriaContainer> {
        let mut elements = Vec::with_capacity(container.elements.len());
        for element in &container.elements {
            elements.push(match element {
                CriteriaElement::Container(child) => CriteriaElement::Container(self.expand(child)?),
                CriteriaElement::Criterion(Criterion::Type(criterion)) if criterion.expand_types => {
                    CriteriaElement::Criterion(Criterion::Type(self.expand_type(criterion)?))
                }
                CriteriaElement::Criterion(Criterion::Property(criterion))
                    if criterion.expand_property =>
                {
                    CriteriaElement::Criterion(Criterion::Property(self.expand_property(criterion)?))
                }
                other => other.clone(),
            });
        }
        Ok(CriteriaContainer {
            kind: container.kind,
            elements,
        })
    }

    fn expand_type(&mut self, criterion: &TypeCriterion) -> VitalSqlResult<TypeCriterion> {
        if matches!(criterion.comparator, Comparator::OneOf | Comparator::NoneOf) {
            return Err(VitalSqlError::query(
                "cannot expand types with a ONE_OF/NONE_OF comparator",
            ));
        }
        let [type_uri] = criterion.types.as_slice() else {
            return Err(VitalSqlError::query(
                "type expansion requires exactly one type",
            ));
        };
        let subclasses = match self.expanded_types.get(type_uri) {
            Some(cached) => cached.clone(),
            None => {
                if self.registry.class(type_uri).is_none() {
                    return Err(VitalSqlError::query(format!(
                        "class metadata not found for type: {type_uri}"
                    )));
                }
                let subclasses = self.registry.subclasses(type_uri, true);
                self.expanded_types
                    .insert(type_uri.clone(), subclasses.clone());
                subclasses
            }
        };
        let mut expanded = criterion.clone();
        expanded.expand_types = false;
        if subclasses.len() > 1 {
            expanded.comparator = match criterion.comparator {
                Comparator::Ne => Comparator::NoneOf,
                _ => Comparator::OneOf,
            };
            expanded.types = subclasses;
        }
        Ok(expanded)
    }

    fn expand_property(&mut self, criterion: &PropertyCriterion) -> VitalSqlResult<PropertyCriterion> {
        let subproperties = match self.expanded_properties.get(&criterion.property) {
            Some(cached) => cached.clone(),
            None => {
                if self.registry.property(&criterion.property).is_none() {
                    return Err(VitalSqlError::query(format!(
                        "property metadata not found for expansion: {}",
                        criterion.property
                    )));
                }
                let subproperties = self.registry.subproperties(&criterion.property, true);
                self.expanded_properties
                    .insert(criterion.property.clone(), subproperties.clone());
                subproperties
            }
        };
        let mut expanded = criterion.clone();
        if subproperties.len() > 1 {
            expanded.expanded = subproperties;
        }
        Ok(expanded)
    }
}

fn resolve_type(criterion: &TypeCriterion) -> VitalSqlResult<TypeCriterion> {
    if criterion.types.is_empty() {
        return Err(VitalSqlError::query("type criterion without types"));
    }
    if !matches!(
        criterion.comparator,
        Comparator::Eq | Comparator::Ne | Comparator::OneOf | Comparator::NoneOf
    ) {
        return Err(VitalSqlError::query(format!(
            "unsupported type criterion comparator: {}",
            criterion.comparator
        )));
    }
    let mut resolved = criterion.clone();
    if resolved.negated {
        resolved.comparator = resolved.comparator.negated().ok_or_else(|| {
            VitalSqlError::query(format!(
                "no corresponding negated comparator for {}",
                criterion.comparator
            ))
        })?;
        resolved.negated = false;
    }
    Ok(resolved)
}

fn validate_value(criterion: &PropertyCriterion) -> VitalSqlResult<()> {
    match (&criterion.value, criterion.comparator) {
        (None, comparator) if comparator.takes_value() => Err(VitalSqlError::query(format!(
            "value is required for {comparator} on {}",
            criterion.property
        ))),
        (Some(QueryValue::Single(_)), Comparator::OneOf | Comparator::NoneOf) => Err(
            VitalSqlError::query("ONE_OF/NONE_OF value must be a list"),
        ),
        (Some(QueryValue::List(values)), Comparator::OneOf | Comparator::NoneOf)
            if values.is_empty() =>
        {
            Err(VitalSqlError::query("ONE_OF/NONE_OF value list must not be empty"))
        }
        (Some(QueryValue::List(_)), comparator)
            if !matches!(comparator, Comparator::OneOf | Comparator::NoneOf) =>
        {
            Err(VitalSqlError::query(format!(
                "{comparator} expects a single value"
            )))
        }
        _ => Ok(()),
    }
}

/// A container holding nothing but one child container is replaced by that child.
fn lift_single_child(container: CriteriaContainer) -> CriteriaContainer {
    let mut elements: Vec<CriteriaElement> = container
        .elements
        .into_iter()
        .map(|element| match element {
            CriteriaElement::Container(child) => CriteriaElement::Container(lift_single_child(child)),
            other => other,
        })
        .collect();
    if elements.len() == 1
        && matches!(elements.first(), Some(CriteriaElement::Container(_)))
        && let Some(CriteriaElement::Container(child)) = elements.pop()
    {
        return child;
    }
    CriteriaContainer {
        kind: container.kind,
        elements,
    }
}

/// Nested containers with a single element are replaced by that element.
fn unwrap_singletons(container: CriteriaContainer) -> CriteriaContainer {
    let elements = container
        .elements
        .into_iter()
        .map(|element| match element {
            CriteriaElement::Container(child) => {
                let mut child = unwrap_singletons(child);
                if child.elements.len() == 1 {
                    child.elements.remove(0)
                } else {
                    CriteriaElement::Container(child)
                }
            }
            other => other,
        })
        .collect();
    CriteriaContainer {
        kind: container.kind,
        elements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitalsql_core::{ClassDef, DomainVersion, OntologyDef, PropertyDef, Value};

    const NS: &str = "http://example.org/ontology/zoo";

    fn uri(name: &str) -> String {
        format!("{NS}#{name}")
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .with_ontology(OntologyDef::new(NS, DomainVersion::new(1, 0, 0)))
            .with_class(ClassDef::new(uri("Animal"), NS))
            .with_class(ClassDef::new(uri("Dog"), NS).extends(uri("Animal")))
            .with_class(ClassDef::new(uri("Cat"), NS).extends(uri("Animal")))
            .with_property(PropertyDef::new(uri("hasName"), ValueKind::String, NS))
            .with_property(
                PropertyDef::new(uri("hasNickName"), ValueKind::String, NS).extends(uri("hasName")),
            )
            .with_property(PropertyDef::new(uri("hasTags"), ValueKind::String, NS).multi())
            .with_property(PropertyDef::new(uri("hasAge"), ValueKind::Integer, NS));
        registry
    }

    fn single(container: &CriteriaContainer) -> &Criterion {
        match container.elements.as_slice() {
            [CriteriaElement::Criterion(criterion)] => criterion,
            other => panic!("unexpected elements: {other:?}"),
        }
    }

    #[test]
    fn negated_comparators_are_replaced() {
        let registry = registry();
        let pairs = [
            (Comparator::Eq, Comparator::Ne),
            (Comparator::Ge, Comparator::Lt),
            (Comparator::Gt, Comparator::Le),
            (Comparator::Exists, Comparator::NotExists),
        ];
        for (input, expected) in pairs {
            let mut criterion = PropertyCriterion::new(uri("hasAge"), input, 3).negate();
            if !input.takes_value() {
                criterion.value = None;
            }
            let container = CriteriaContainer::and(vec![criterion.into()]);
            let normalized = Normalizer::new(&registry).normalize(&container).expect("normalize");
            match single(&normalized) {
                Criterion::Property(resolved) => {
                    assert_eq!(resolved.comparator, expected);
                    assert!(!resolved.negated);
                }
                other => panic!("unexpected criterion {other:?}"),
            }
        }
    }

    #[test]
    fn non_negatable_comparators_are_rejected() {
        let registry = registry();
        for comparator in [
            Comparator::ContainsCaseInsensitive,
            Comparator::EqCaseInsensitive,
            Comparator::Regexp,
        ] {
            let container = CriteriaContainer::and(vec![
                PropertyCriterion::new(uri("hasName"), comparator, "x").negate().into(),
            ]);
            let result = Normalizer::new(&registry).normalize(&container);
            assert!(matches!(result, Err(VitalSqlError::QueryValidation { .. })));
        }
    }

    #[test]
    fn multi_valued_properties_require_contains() {
        let registry = registry();
        let bad = CriteriaContainer::and(vec![
            PropertyCriterion::new(uri("hasTags"), Comparator::Eq, "a").into(),
        ]);
        assert!(Normalizer::new(&registry).normalize(&bad).is_err());
        let bad = CriteriaContainer::and(vec![
            PropertyCriterion::new(uri("hasName"), Comparator::Contains, "a").into(),
        ]);
        assert!(Normalizer::new(&registry).normalize(&bad).is_err());
        let good = CriteriaContainer::and(vec![
            PropertyCriterion::new(uri("hasTags"), Comparator::Contains, "a").negate().into(),
        ]);
        let normalized = Normalizer::new(&registry).normalize(&good).expect("normalize");
        assert_eq!(single(&normalized).comparator(), Comparator::NotContains);
    }

    #[test]
    fn uri_pseudo_property_maps_to_uri_prop() {
        let registry = registry();
        let container = CriteriaContainer::and(vec![
            PropertyCriterion::new(vocab::URI, Comparator::Eq, Value::Uri("urn:a".into())).into(),
        ]);
        let normalized = Normalizer::new(&registry).normalize(&container).expect("normalize");
        match single(&normalized) {
            Criterion::Property(criterion) => assert_eq!(criterion.property, vocab::URI_PROP),
            other => panic!("unexpected criterion {other:?}"),
        }
    }

    #[test]
    fn expands_types_and_properties() {
        let registry = registry();
        let container = CriteriaContainer::and(vec![
            TypeCriterion::is(uri("Animal")).expand().into(),
            PropertyCriterion::new(uri("hasName"), Comparator::Eq, "rex").expand().into(),
            TypeCriterion::is(uri("Dog")).expand().into(),
        ]);
        let normalized = Normalizer::new(&registry).normalize(&container).expect("normalize");
        let criteria: Vec<_> = normalized.criteria().collect();
        match criteria[0] {
            Criterion::Type(criterion) => {
                assert_eq!(criterion.comparator, Comparator::OneOf);
                assert_eq!(criterion.types.len(), 3);
            }
            other => panic!("unexpected criterion {other:?}"),
        }
        match criteria[1] {
            Criterion::Property(criterion) => {
                assert_eq!(criterion.property_names(), vec![uri("hasName"), uri("hasNickName")]);
            }
            other => panic!("unexpected criterion {other:?}"),
        }
        match criteria[2] {
            Criterion::Type(criterion) => {
                assert_eq!(criterion.comparator, Comparator::Eq);
                assert_eq!(criterion.types, vec![uri("Dog")]);
            }
            other => panic!("unexpected criterion {other:?}"),
        }
    }

    #[test]
    fn expanding_one_of_is_rejected() {
        let registry = registry();
        let container = CriteriaContainer::and(vec![
            TypeCriterion::one_of(vec![uri("Dog"), uri("Cat")]).expand().into(),
        ]);
        assert!(Normalizer::new(&registry).normalize(&container).is_err());
    }

    #[test]
    fn flattens_redundant_containers() {
        let registry = registry();
        let inner = CriteriaContainer::or(vec![
            TypeCriterion::is(uri("Dog")).into(),
            TypeCriterion::is(uri("Cat")).into(),
        ]);
        let wrapped = CriteriaContainer::and(vec![CriteriaContainer::and(vec![inner.into()]).into()]);
        let normalized = Normalizer::new(&registry).normalize(&wrapped).expect("normalize");
        assert_eq!(normalized.kind, vitalsql_core::ContainerKind::Or);
        assert_eq!(normalized.elements.len(), 2);

        let nested = CriteriaContainer::or(vec![
            CriteriaContainer::and(vec![TypeCriterion::is(uri("Dog")).into()]).into(),
            TypeCriterion::is(uri("Cat")).into(),
        ]);
        let normalized = Normalizer::new(&registry).normalize(&nested).expect("normalize");
        assert_eq!(normalized.criteria().count(), 2);
        assert_eq!(normalized.containers().count(), 0);
    }

    #[test]
    fn missing_values_are_rejected() {
        let registry = registry();
        let mut criterion = PropertyCriterion::new(uri("hasAge"), Comparator::Eq, 1);
        criterion.value = None;
        let container = CriteriaContainer::and(vec![criterion.into()]);
        assert!(Normalizer::new(&registry).normalize(&container).is_err());
        let container = CriteriaContainer::and(vec![
            PropertyCriterion::new(uri("hasAge"), Comparator::OneOf, 1).into(),
        ]);
        assert!(Normalizer::new(&registry).normalize(&container).is_err());
    }
}
