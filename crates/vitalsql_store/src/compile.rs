use sea_orm::sea_query::{
    Alias, Cond, Expr, ExprTrait, Func, Query, SelectStatement, Value as SeaValue,
};

use crate::codec;
use crate::db::SegmentColumn;
use crate::dialect::SqlDialect;
use crate::optimize::{self, TypeAndFold};
use vitalsql_core::{
    Comparator, ContainerKind, CriteriaContainer, CriteriaElement, Criterion, PropertyCriterion,
    Registry, TypeCriterion, Value, ValueKind, VitalSqlError, VitalSqlResult, versionless, vocab,
};

/// A URI-selecting statement for one criterion. `negated` leaves select the objects to
/// remove from the segment rather than the ones to keep.
#[derive(Clone, Debug)]
pub struct LeafQuery {
    pub statement: SelectStatement,
    pub negated: bool,
}

/// Comparators accepted for a single-valued property of each kind.
pub fn supports(kind: ValueKind, comparator: Comparator) -> bool {
    let basic = matches!(
        comparator,
        Comparator::Exists
            | Comparator::Eq
            | Comparator::NotExists
            | Comparator::Ne
            | Comparator::OneOf
            | Comparator::NoneOf
    );
    match kind {
        ValueKind::Boolean | ValueKind::Truth | ValueKind::Uri => basic,
        ValueKind::Date
        | ValueKind::Double
        | ValueKind::Float
        | ValueKind::Integer
        | ValueKind::Long => {
            basic
                || matches!(
                    comparator,
                    Comparator::Ge | Comparator::Gt | Comparator::Le | Comparator::Lt
                )
        }
        ValueKind::String => {
            basic
                || matches!(
                    comparator,
                    Comparator::ContainsCaseSensitive
                        | Comparator::ContainsCaseInsensitive
                        | Comparator::EqCaseInsensitive
                        | Comparator::Regexp
                        | Comparator::RegexpCaseSensitive
                )
        }
        ValueKind::GeoLocation | ValueKind::Other => false,
    }
}

/// Compiles normalized criteria into statements over one segment table.
pub struct SegmentCompiler<'a> {
    registry: &'a Registry,
    dialect: &'a dyn SqlDialect,
    table: String,
}

impl<'a> SegmentCompiler<'a> {
    pub fn new(registry: &'a Registry, dialect: &'a dyn SqlDialect, table: impl Into<String>) -> Self {
        Self {
            registry,
            dialect,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn select_uris(&self) -> SelectStatement {
        Query::select()
            .distinct()
            .column(SegmentColumn::Uri)
            .from(Alias::new(self.table.clone()))
            .to_owned()
    }

    pub fn leaf(&self, criterion: &Criterion, fold: Option<&TypeAndFold>) -> VitalSqlResult<LeafQuery> {
        let mut cond = Cond::all();
        if let Some(fold) = fold {
            cond = cond.add(fold_condition(fold));
        }
        let negated = match criterion {
            Criterion::Type(criterion) => {
                cond = cond
                    .add(Expr::col(SegmentColumn::Name).eq(vocab::VITALTYPE))
                    .add(type_condition(criterion)?);
                false
            }
            Criterion::Property(criterion) => {
                cond = cond.add(name_condition(criterion));
                if let Some(value) = self.value_condition(criterion)? {
                    cond = cond.add(value);
                }
                criterion.comparator.is_set_negation()
            }
        };
        Ok(LeafQuery {
            statement: self.select_uris().cond_where(cond).to_owned(),
            negated,
        })
    }

    /// The folded predicate alone, for AND containers whose criteria were all folded.
    pub fn fold_only(&self, fold: &TypeAndFold) -> SelectStatement {
        self.select_uris().cond_where(fold_condition(fold)).to_owned()
    }

    /// `LIMIT 1` existence check used to short-circuit AND containers.
    pub fn probe(&self, criterion: &Criterion) -> VitalSqlResult<SelectStatement> {
        let mut cond = Cond::all();
        match criterion {
            Criterion::Type(criterion) => {
                cond = cond
                    .add(Expr::col(SegmentColumn::Name).eq(vocab::VITALTYPE))
                    .add(type_condition(criterion)?);
            }
            Criterion::Property(criterion) => {
                cond = cond.add(name_condition(criterion));
            }
        }
        Ok(Query::select()
            .column(SegmentColumn::Uri)
            .from(Alias::new(self.table.clone()))
            .cond_where(cond)
            .limit(1)
            .offset(0)
            .to_owned())
    }

    /// One statement selecting every URI that satisfies the whole container.
    pub fn container(&self, container: &CriteriaContainer, fold_types: bool) -> VitalSqlResult<SelectStatement> {
        let cond = self.container_condition(container, fold_types)?;
        Ok(self.select_uris().cond_where(cond).to_owned())
    }

    fn container_condition(&self, container: &CriteriaContainer, fold_types: bool) -> VitalSqlResult<Cond> {
        if container.elements.is_empty() {
            return Ok(match container.kind {
                ContainerKind::And => Cond::all(),
                ContainerKind::Or => Cond::all().add(never()),
            });
        }
        let fold = if fold_types {
            optimize::fold_type_and(container)?
        } else {
            None
        };
        if fold.as_ref().is_some_and(|fold| fold.unsatisfiable) {
            return Ok(Cond::all().add(never()));
        }
        let mut cond = match container.kind {
            ContainerKind::And => Cond::all(),
            ContainerKind::Or => Cond::any(),
        };
        let mut fold_applied = false;
        for (index, element) in container.elements.iter().enumerate() {
            if fold.as_ref().is_some_and(|fold| fold.covers(index)) {
                continue;
            }
            match element {
                CriteriaElement::Container(child) => {
                    let folded = if fold_types {
                        optimize::fold_type_or(child).or_else(|| optimize::fold_type_ne_and(child))
                    } else {
                        None
                    };
                    match folded {
                        Some(criterion) => {
                            let leaf = self.leaf(&Criterion::Type(criterion), fold.as_ref())?;
                            fold_applied |= fold.is_some();
                            cond = cond.add(Expr::col(SegmentColumn::Uri).in_subquery(leaf.statement));
                        }
                        None => cond = cond.add(self.container_condition(child, fold_types)?),
                    }
                }
                CriteriaElement::Criterion(criterion) => {
                    let negated = matches!(criterion, Criterion::Property(p) if p.comparator.is_set_negation());
                    let prefix = if negated { None } else { fold.as_ref() };
                    let leaf = self.leaf(criterion, prefix)?;
                    let uri = Expr::col(SegmentColumn::Uri);
                    if leaf.negated {
                        cond = cond.add(uri.not_in_subquery(leaf.statement));
                    } else {
                        fold_applied |= prefix.is_some();
                        cond = cond.add(uri.in_subquery(leaf.statement));
                    }
                }
            }
        }
        if let Some(fold) = &fold
            && !fold_applied
        {
            cond = cond.add(Expr::col(SegmentColumn::Uri).in_subquery(self.fold_only(fold)));
        }
        Ok(cond)
    }

    fn value_condition(&self, criterion: &PropertyCriterion) -> VitalSqlResult<Option<Expr>> {
        let comparator = criterion.comparator;
        if !comparator.takes_value() {
            return Ok(None);
        }
        let values = criterion
            .value
            .as_ref()
            .map(|value| value.values())
            .unwrap_or_default();
        let first = values.first().ok_or_else(|| {
            VitalSqlError::query(format!(
                "{comparator} criterion on {} requires a value",
                criterion.property
            ))
        })?;

        let (kind, multi) = match self.registry.property(&criterion.property) {
            Some(def) => (def.kind, def.multi_valued),
            None => (
                first.kind(),
                matches!(comparator, Comparator::Contains | Comparator::NotContains),
            ),
        };
        let set_membership = multi && matches!(comparator, Comparator::Contains | Comparator::NotContains);
        if !set_membership && !supports(kind, comparator) {
            return Err(VitalSqlError::query(format!(
                "unsupported comparator {comparator} for {} property {}",
                kind.as_str(),
                criterion.property
            )));
        }

        let column = Expr::col(SegmentColumn::value_column(kind, multi));
        let lowered_column = || Expr::from(Func::lower(Expr::col(SegmentColumn::value_column(kind, multi))));
        let value = stored(first);
        Ok(Some(match comparator {
            Comparator::Contains | Comparator::NotContains | Comparator::Eq => column.eq(value),
            Comparator::Ne => column.ne(value),
            Comparator::Ge => column.gte(value),
            Comparator::Gt => column.gt(value),
            Comparator::Le => column.lte(value),
            Comparator::Lt => column.lt(value),
            Comparator::ContainsCaseInsensitive => self
                .dialect
                .locate(Expr::val(lowered(first)?), lowered_column())
                .gt(0),
            Comparator::ContainsCaseSensitive => self.dialect.locate(Expr::val(value), column).gt(0),
            Comparator::EqCaseInsensitive => lowered_column().eq(lowered(first)?),
            Comparator::Regexp => self.dialect.regexp(Expr::val(lowered(first)?), lowered_column())?,
            Comparator::RegexpCaseSensitive => self.dialect.regexp(Expr::val(value), column)?,
            Comparator::OneOf => column.is_in(values.iter().map(stored)),
            Comparator::NoneOf => column.is_not_in(values.iter().map(stored)),
            Comparator::Exists | Comparator::NotExists => return Ok(None),
        }))
    }
}

fn never() -> Expr {
    Expr::cust("1 = 0")
}

fn stored(value: &Value) -> SeaValue {
    match value {
        Value::Uri(uri) => versionless(uri).into(),
        other => codec::to_sea(other),
    }
}

fn lowered(value: &Value) -> VitalSqlResult<String> {
    value
        .as_str()
        .map(str::to_lowercase)
        .ok_or_else(|| VitalSqlError::query("case-insensitive comparators require a text value"))
}

fn name_condition(criterion: &PropertyCriterion) -> Expr {
    let names: Vec<String> = criterion
        .property_names()
        .iter()
        .map(|name| versionless(name))
        .collect();
    let name = Expr::col(SegmentColumn::Name);
    match names.as_slice() {
        [single] => name.eq(single.clone()),
        _ => name.is_in(names),
    }
}

fn type_condition(criterion: &TypeCriterion) -> VitalSqlResult<Expr> {
    let types: Vec<String> = criterion.types.iter().map(|uri| versionless(uri)).collect();
    let first = types
        .first()
        .cloned()
        .ok_or_else(|| VitalSqlError::query("type criterion without types"))?;
    let column = Expr::col(SegmentColumn::Vitaltype);
    match criterion.comparator {
        Comparator::Eq => Ok(column.eq(first)),
        Comparator::Ne => Ok(column.ne(first)),
        Comparator::OneOf => Ok(column.is_in(types)),
        Comparator::NoneOf => Ok(column.is_not_in(types)),
        other => Err(VitalSqlError::query(format!(
            "unsupported type criterion comparator: {other}"
        ))),
    }
}

fn fold_condition(fold: &TypeAndFold) -> Cond {
    let mut cond = Cond::all();
    if fold.unsatisfiable {
        return cond.add(never());
    }
    let vitaltype = Expr::col(SegmentColumn::Vitaltype);
    cond = match (fold.types.as_slice(), fold.include) {
        ([], _) => cond,
        ([single], true) => cond.add(vitaltype.eq(single.clone())),
        ([single], false) => cond.add(vitaltype.ne(single.clone())),
        (types, true) => cond.add(vitaltype.is_in(types.to_vec())),
        (types, false) => cond.add(vitaltype.is_not_in(types.to_vec())),
    };
    if let Some(channel) = &fold.channel {
        let column = Expr::col(SegmentColumn::Channeluri);
        let uris: Vec<String> = channel.uris.iter().map(|uri| versionless(uri)).collect();
        let first = uris.first().cloned().unwrap_or_default();
        cond = cond.add(match channel.comparator {
            Comparator::Ne => column.ne(first),
            Comparator::OneOf => column.is_in(uris),
            Comparator::NoneOf => column.is_not_in(uris),
            _ => column.eq(first),
        });
    }
    if let Some(min) = fold.min_timestamp {
        let column = Expr::col(SegmentColumn::Tstamp);
        cond = cond.add(if min.inclusive {
            column.gte(min.value)
        } else {
            column.gt(min.value)
        });
    }
    if let Some(max) = fold.max_timestamp {
        let column = Expr::col(SegmentColumn::Tstamp);
        cond = cond.add(if max.inclusive {
            column.lte(max.value)
        } else {
            column.lt(max.value)
        });
    }
    cond
}
