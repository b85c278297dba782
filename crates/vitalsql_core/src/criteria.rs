use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparator {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
    Exists,
    NotExists,
    Contains,
    ContainsCaseInsensitive,
    ContainsCaseSensitive,
    NotContains,
    EqCaseInsensitive,
    Regexp,
    RegexpCaseSensitive,
    OneOf,
    NoneOf,
}

impl Comparator {
    /// Logical complement, or `None` for comparators that cannot be negated.
    pub fn negated(self) -> Option<Comparator> {
        match self {
            Comparator::Eq => Some(Comparator::Ne),
            Comparator::Ne => Some(Comparator::Eq),
            Comparator::Ge => Some(Comparator::Lt),
            Comparator::Lt => Some(Comparator::Ge),
            Comparator::Gt => Some(Comparator::Le),
            Comparator::Le => Some(Comparator::Gt),
            Comparator::Contains => Some(Comparator::NotContains),
            Comparator::NotContains => Some(Comparator::Contains),
            Comparator::Exists => Some(Comparator::NotExists),
            Comparator::NotExists => Some(Comparator::Exists),
            Comparator::ContainsCaseInsensitive
            | Comparator::ContainsCaseSensitive
            | Comparator::EqCaseInsensitive
            | Comparator::Regexp
            | Comparator::RegexpCaseSensitive
            | Comparator::OneOf
            | Comparator::NoneOf => None,
        }
    }

    /// Comparators evaluated as "all URIs minus the positive match".
    pub fn is_set_negation(self) -> bool {
        matches!(self, Comparator::NotContains | Comparator::NotExists)
    }

    /// Comparators that cannot prove a container non-empty with a single existence probe.
    pub fn is_exclusive(self) -> bool {
        matches!(
            self,
            Comparator::Ne | Comparator::NoneOf | Comparator::NotContains | Comparator::NotExists
        )
    }

    pub fn takes_value(self) -> bool {
        !matches!(self, Comparator::Exists | Comparator::NotExists)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Eq => "EQ",
            Comparator::Ne => "NE",
            Comparator::Ge => "GE",
            Comparator::Gt => "GT",
            Comparator::Le => "LE",
            Comparator::Lt => "LT",
            Comparator::Exists => "EXISTS",
            Comparator::NotExists => "NOT_EXISTS",
            Comparator::Contains => "CONTAINS",
            Comparator::ContainsCaseInsensitive => "CONTAINS_CASE_INSENSITIVE",
            Comparator::ContainsCaseSensitive => "CONTAINS_CASE_SENSITIVE",
            Comparator::NotContains => "NOT_CONTAINS",
            Comparator::EqCaseInsensitive => "EQ_CASE_INSENSITIVE",
            Comparator::Regexp => "REGEXP",
            Comparator::RegexpCaseSensitive => "REGEXP_CASE_SENSITIVE",
            Comparator::OneOf => "ONE_OF",
            Comparator::NoneOf => "NONE_OF",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Single(Value),
    List(Vec<Value>),
}

impl QueryValue {
    pub fn values(&self) -> &[Value] {
        match self {
            QueryValue::Single(value) => std::slice::from_ref(value),
            QueryValue::List(values) => values,
        }
    }
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        QueryValue::Single(value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyCriterion {
    pub property: String,
    pub comparator: Comparator,
    pub value: Option<QueryValue>,
    pub negated: bool,
    pub expand_property: bool,
    /// Sub-property closure filled in during normalization; empty means `property` only.
    #[serde(default)]
    pub expanded: Vec<String>,
}

impl PropertyCriterion {
    pub fn new(property: impl Into<String>, comparator: Comparator, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            comparator,
            value: Some(QueryValue::Single(value.into())),
            negated: false,
            expand_property: false,
            expanded: Vec::new(),
        }
    }

    pub fn exists(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            comparator: Comparator::Exists,
            value: None,
            negated: false,
            expand_property: false,
            expanded: Vec::new(),
        }
    }

    pub fn list(property: impl Into<String>, comparator: Comparator, values: Vec<Value>) -> Self {
        Self {
            value: Some(QueryValue::List(values)),
            ..Self::exists(property).with_comparator(comparator)
        }
    }

    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn expand(mut self) -> Self {
        self.expand_property = true;
        self
    }

    /// Property URIs the criterion matches against.
    pub fn property_names(&self) -> Vec<String> {
        if self.expanded.is_empty() {
            vec![self.property.clone()]
        } else {
            self.expanded.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeCriterion {
    pub types: Vec<String>,
    pub comparator: Comparator,
    pub expand_types: bool,
    pub negated: bool,
}

impl TypeCriterion {
    pub fn is(type_uri: impl Into<String>) -> Self {
        Self {
            types: vec![type_uri.into()],
            comparator: Comparator::Eq,
            expand_types: false,
            negated: false,
        }
    }

    pub fn is_not(type_uri: impl Into<String>) -> Self {
        Self {
            comparator: Comparator::Ne,
            ..Self::is(type_uri)
        }
    }

    pub fn one_of(types: Vec<String>) -> Self {
        Self {
            types,
            comparator: Comparator::OneOf,
            expand_types: false,
            negated: false,
        }
    }

    pub fn none_of(types: Vec<String>) -> Self {
        Self {
            comparator: Comparator::NoneOf,
            ..Self::one_of(types)
        }
    }

    pub fn expand(mut self) -> Self {
        self.expand_types = true;
        self
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Whether the criterion restricts to the listed types rather than excluding them.
    pub fn is_inclusive(&self) -> bool {
        matches!(self.comparator, Comparator::Eq | Comparator::OneOf)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Criterion {
    Property(PropertyCriterion),
    Type(TypeCriterion),
}

impl Criterion {
    pub fn comparator(&self) -> Comparator {
        match self {
            Criterion::Property(criterion) => criterion.comparator,
            Criterion::Type(criterion) => criterion.comparator,
        }
    }

    pub fn is_negated(&self) -> bool {
        match self {
            Criterion::Property(criterion) => criterion.negated,
            Criterion::Type(criterion) => criterion.negated,
        }
    }
}

impl From<PropertyCriterion> for Criterion {
    fn from(value: PropertyCriterion) -> Self {
        Criterion::Property(value)
    }
}

impl From<TypeCriterion> for Criterion {
    fn from(value: TypeCriterion) -> Self {
        Criterion::Type(value)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ContainerKind {
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CriteriaElement {
    Container(CriteriaContainer),
    Criterion(Criterion),
}

impl From<CriteriaContainer> for CriteriaElement {
    fn from(value: CriteriaContainer) -> Self {
        CriteriaElement::Container(value)
    }
}

impl From<Criterion> for CriteriaElement {
    fn from(value: Criterion) -> Self {
        CriteriaElement::Criterion(value)
    }
}

impl From<PropertyCriterion> for CriteriaElement {
    fn from(value: PropertyCriterion) -> Self {
        CriteriaElement::Criterion(Criterion::Property(value))
    }
}

impl From<TypeCriterion> for CriteriaElement {
    fn from(value: TypeCriterion) -> Self {
        CriteriaElement::Criterion(Criterion::Type(value))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CriteriaContainer {
    pub kind: ContainerKind,
    pub elements: Vec<CriteriaElement>,
}

impl CriteriaContainer {
    pub fn and(elements: Vec<CriteriaElement>) -> Self {
        Self {
            kind: ContainerKind::And,
            elements,
        }
    }

    pub fn or(elements: Vec<CriteriaElement>) -> Self {
        Self {
            kind: ContainerKind::Or,
            elements,
        }
    }

    pub fn push(mut self, element: impl Into<CriteriaElement>) -> Self {
        self.elements.push(element.into());
        self
    }

    pub fn criteria(&self) -> impl Iterator<Item = &Criterion> {
        self.elements.iter().filter_map(|element| match element {
            CriteriaElement::Criterion(criterion) => Some(criterion),
            CriteriaElement::Container(_) => None,
        })
    }

    pub fn containers(&self) -> impl Iterator<Item = &CriteriaContainer> {
        self.elements.iter().filter_map(|element| match element {
            CriteriaElement::Container(container) => Some(container),
            CriteriaElement::Criterion(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Comparator; 17] = [
        Comparator::Eq,
        Comparator::Ne,
        Comparator::Ge,
        Comparator::Gt,
        Comparator::Le,
        Comparator::Lt,
        Comparator::Exists,
        Comparator::NotExists,
        Comparator::Contains,
        Comparator::ContainsCaseInsensitive,
        Comparator::ContainsCaseSensitive,
        Comparator::NotContains,
        Comparator::EqCaseInsensitive,
        Comparator::Regexp,
        Comparator::RegexpCaseSensitive,
        Comparator::OneOf,
        Comparator::NoneOf,
    ];

    #[test]
    fn negation_is_an_involution() {
        for comparator in ALL {
            if let Some(negated) = comparator.negated() {
                assert_eq!(negated.negated(), Some(comparator), "{comparator}");
            }
        }
        let rejected: Vec<_> = ALL.iter().filter(|c| c.negated().is_none()).collect();
        assert_eq!(rejected.len(), 7);
    }

    #[test]
    fn property_names_default_to_property() {
        let criterion = PropertyCriterion::new("urn:p", Comparator::Eq, 1);
        assert_eq!(criterion.property_names(), vec!["urn:p".to_string()]);
        let exists = PropertyCriterion::exists("urn:p");
        assert!(exists.value.is_none());
        assert!(!exists.comparator.takes_value() || exists.value.is_some());
    }

    #[test]
    fn containers_split_elements() {
        let container = CriteriaContainer::and(vec![])
            .push(TypeCriterion::is("urn:T"))
            .push(CriteriaContainer::or(vec![]));
        assert_eq!(container.criteria().count(), 1);
        assert_eq!(container.containers().count(), 1);
    }
}
