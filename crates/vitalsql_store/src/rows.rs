use std::collections::{BTreeMap, HashMap};

use sea_orm::{Iden, QueryResult};
use sea_orm::sea_query::Value as SeaValue;

use crate::codec::{self, Decoded, OverflowMode};
use crate::config::VersionEnforcement;
use crate::db::SegmentColumn;
use vitalsql_core::{
    DomainVersion, GraphObject, PropertyValue, Registry, Value, ValueKind, VitalSqlError,
    VitalSqlResult, to_old_version, versionless, vocab,
};

/// One property value of one object, as stored in a segment table.
#[derive(Clone, Debug, PartialEq)]
pub struct EavRow {
    pub uri: String,
    pub name: String,
    pub vitaltype: String,
    pub external: bool,
    pub tstamp: Option<i64>,
    pub channel_uri: Option<String>,
    pub value: Value,
    pub multi: bool,
    pub full_text: Option<String>,
}

impl EavRow {
    /// Reads a row selected with [`SegmentColumn::ALL`], or without `value_full_text`
    /// when `with_full_text` is false.
    pub fn from_query_result(row: &QueryResult, with_full_text: bool) -> VitalSqlResult<Self> {
        let (value, multi) = codec::read_row_value(row)?;
        let full_text = if with_full_text {
            row.try_get("", &col_name(SegmentColumn::ValueFullText))?
        } else {
            None
        };
        Ok(Self {
            uri: row.try_get("", &col_name(SegmentColumn::Uri))?,
            name: row.try_get("", &col_name(SegmentColumn::Name))?,
            vitaltype: row.try_get("", &col_name(SegmentColumn::Vitaltype))?,
            external: row.try_get("", &col_name(SegmentColumn::External))?,
            tstamp: row.try_get("", &col_name(SegmentColumn::Tstamp))?,
            channel_uri: row.try_get("", &col_name(SegmentColumn::Channeluri))?,
            value,
            multi,
            full_text,
        })
    }

    /// Values for every column of [`SegmentColumn::ALL`], in order.
    pub fn insert_values(&self) -> Vec<SeaValue> {
        let value_column = SegmentColumn::value_column(self.value.kind(), self.multi);
        SegmentColumn::ALL
            .iter()
            .map(|column| match column {
                SegmentColumn::Uri => self.uri.clone().into(),
                SegmentColumn::Name => self.name.clone().into(),
                SegmentColumn::Vitaltype => self.vitaltype.clone().into(),
                SegmentColumn::External => self.external.into(),
                SegmentColumn::Tstamp => self.tstamp.into(),
                SegmentColumn::Channeluri => self.channel_uri.clone().into(),
                SegmentColumn::ValueFullText => self.full_text.clone().into(),
                column if *column == value_column => codec::to_sea(&self.value),
                column => null_for(*column),
            })
            .collect()
    }
}

fn col_name(column: SegmentColumn) -> String {
    column.to_string()
}

fn null_for(column: SegmentColumn) -> SeaValue {
    match column {
        SegmentColumn::External
        | SegmentColumn::ValueBoolean
        | SegmentColumn::ValueBooleanMultivalue => Option::<bool>::None.into(),
        SegmentColumn::Tstamp
        | SegmentColumn::ValueDate
        | SegmentColumn::ValueDateMultivalue
        | SegmentColumn::ValueLong
        | SegmentColumn::ValueLongMultivalue => Option::<i64>::None.into(),
        SegmentColumn::ValueDouble | SegmentColumn::ValueDoubleMultivalue => {
            Option::<f64>::None.into()
        }
        SegmentColumn::ValueFloat | SegmentColumn::ValueFloatMultivalue => {
            Option::<f32>::None.into()
        }
        SegmentColumn::ValueInteger | SegmentColumn::ValueIntegerMultivalue => {
            Option::<i32>::None.into()
        }
        SegmentColumn::ValueTruth | SegmentColumn::ValueTruthMultivalue => {
            Option::<i16>::None.into()
        }
        _ => Option::<String>::None.into(),
    }
}

/// Expands an object into EAV rows, one per scalar value.
pub fn to_rows(object: &GraphObject, registry: &Registry) -> VitalSqlResult<Vec<EavRow>> {
    object.validate()?;
    let vitaltype = versionless(&object.vitaltype);
    let class = registry
        .class(&vitaltype)
        .ok_or_else(|| VitalSqlError::query(format!("unknown class: {vitaltype}")))?;
    let ontology = registry.ontology(&class.ontology).ok_or_else(|| {
        VitalSqlError::configuration(format!(
            "no ontology registered for class {vitaltype}: {}",
            class.ontology
        ))
    })?;
    let tstamp = object.timestamp();
    let channel_uri = if registry.is_subclass_of(&vitaltype, vocab::AIMP_MESSAGE) {
        object
            .get(vocab::HAS_CHANNEL_URI)
            .and_then(PropertyValue::first)
            .and_then(Value::as_str)
            .map(versionless)
    } else {
        None
    };

    let mut entries: Vec<(String, PropertyValue)> = vec![
        (
            vocab::VITALTYPE.to_string(),
            PropertyValue::Single(Value::Uri(object.vitaltype.clone())),
        ),
        (
            vocab::TYPES.to_string(),
            PropertyValue::Multi(object.types.iter().cloned().map(Value::Uri).collect()),
        ),
        (
            vocab::URI_PROP.to_string(),
            PropertyValue::Single(Value::Uri(object.uri.clone())),
        ),
    ];
    entries.extend(
        object
            .properties
            .iter()
            .filter(|(name, _)| !vocab::is_structural(&versionless(name)))
            .map(|(name, value)| (name.clone(), value.clone())),
    );
    entries.push((
        vocab::HAS_ONTOLOGY_IRI.to_string(),
        PropertyValue::Single(Value::Uri(ontology.uri.clone())),
    ));
    entries.push((
        vocab::HAS_VERSION_IRI.to_string(),
        PropertyValue::Single(Value::String(ontology.version.to_string())),
    ));

    let mut rows = Vec::new();
    for (name, property_value) in entries {
        let name = versionless(&name);
        let external = registry.property(&name).is_none();
        let multi = property_value.is_multi();
        for value in property_value.values() {
            let value = match value {
                Value::Uri(uri) => Value::Uri(versionless(uri)),
                other => other.clone(),
            };
            let encoded = codec::encode(&value, multi);
            rows.push(EavRow {
                uri: object.uri.clone(),
                name: name.clone(),
                vitaltype: vitaltype.clone(),
                external,
                tstamp,
                channel_uri: channel_uri.clone(),
                value: encoded.stored,
                multi,
                full_text: encoded.full_text,
            });
        }
    }
    Ok(rows)
}

#[derive(Clone, Copy, Debug)]
pub struct ReadOptions {
    pub enforcement: VersionEnforcement,
    pub external_properties: bool,
    pub ignore_broken_data: bool,
    pub overflow: OverflowMode,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            enforcement: VersionEnforcement::Strict,
            external_properties: false,
            ignore_broken_data: false,
            overflow: OverflowMode::Inline,
        }
    }
}

/// An overflowed value whose full text has not been fetched yet.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeferredOverflow {
    pub uri: String,
    /// Stored property name, before any older-version rewrite.
    pub stored_name: String,
    pub property: String,
    pub kind: ValueKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedObject {
    pub object: GraphObject,
    pub deferred: Vec<DeferredOverflow>,
}

struct PropertyRows {
    external: bool,
    multi: bool,
    values: Vec<(Value, Option<String>)>,
}

/// Rebuilds one object from all of its rows. `Ok(None)` means the object was broken and
/// dropped under `ignore_broken_data`.
pub fn from_rows(
    rows: Vec<EavRow>,
    registry: &Registry,
    options: &ReadOptions,
) -> VitalSqlResult<Option<DecodedObject>> {
    let Some(uri) = rows.first().map(|row| row.uri.clone()) else {
        return Ok(None);
    };
    let mut grouped: BTreeMap<String, PropertyRows> = BTreeMap::new();
    for row in rows {
        if row.uri != uri {
            return Err(VitalSqlError::integrity(format!(
                "row for {} mixed into rows for {uri}",
                row.uri
            )));
        }
        let entry = grouped.entry(row.name.clone()).or_insert(PropertyRows {
            external: row.external,
            multi: row.multi,
            values: Vec::new(),
        });
        if entry.multi != row.multi {
            return Err(VitalSqlError::integrity(format!(
                "property {} of {uri} mixes single and multi-valued rows",
                row.name
            )));
        }
        if !row.multi && !entry.values.is_empty() {
            return Err(VitalSqlError::integrity(format!(
                "property {} of {uri} has more than one single-valued row",
                row.name
            )));
        }
        entry.values.push((row.value, row.full_text));
    }

    let Some(vitaltype) = first_uri(&grouped, vocab::VITALTYPE) else {
        return broken(options, &uri, format!("object {uri} has no vitaltype"));
    };
    let Some(types_rows) = grouped.get(vocab::TYPES) else {
        return broken(options, &uri, format!("object {uri} has no types property"));
    };
    let stored_types: Vec<String> = types_rows
        .values
        .iter()
        .filter_map(|(value, _)| value.as_str().map(str::to_string))
        .collect();

    let old_versions = reconcile_version(&uri, &grouped, registry, options)?;
    let rewrite = |value: &str| match &old_versions {
        Some(map) => to_old_version(value, map),
        None => value.to_string(),
    };

    let vitaltype = rewrite(&vitaltype);
    let mut types = vec![vitaltype.clone()];
    for type_uri in stored_types {
        let type_uri = rewrite(&type_uri);
        if !types.contains(&type_uri) {
            types.push(type_uri);
        }
    }
    if registry.class(&vitaltype).is_none() {
        return broken(options, &uri, format!("unknown class {vitaltype} for {uri}"));
    }
    let allow_external = options.external_properties || registry.is_container(&vitaltype);

    let mut object = GraphObject {
        uri: uri.clone(),
        vitaltype,
        types,
        properties: BTreeMap::new(),
    };
    let mut deferred = Vec::new();
    for (stored_name, property_rows) in grouped {
        if vocab::is_structural(&stored_name) {
            continue;
        }
        let name = rewrite(&stored_name);
        let multi = match registry.property(&name) {
            Some(def) => def.multi_valued || property_rows.multi,
            None if property_rows.external && allow_external => property_rows.multi,
            None => {
                let message = format!("unknown property {name} on {uri}");
                if options.enforcement == VersionEnforcement::Lenient {
                    log::warn!("skipping {message}");
                    continue;
                }
                return broken(options, &uri, message);
            }
        };
        let mut values = Vec::with_capacity(property_rows.values.len());
        for (stored, full_text) in property_rows.values {
            match codec::decode(&stored, full_text.as_deref(), options.overflow)? {
                Decoded::Ready(Value::Uri(value)) => values.push(Value::Uri(rewrite(&value))),
                Decoded::Ready(value) => values.push(value),
                Decoded::Deferred(kind) => {
                    deferred.push(DeferredOverflow {
                        uri: uri.clone(),
                        stored_name: stored_name.clone(),
                        property: name.clone(),
                        kind,
                    });
                    values.push(stored);
                }
            }
        }
        let value = if multi {
            PropertyValue::Multi(values)
        } else {
            match values.into_iter().next() {
                Some(value) => PropertyValue::Single(value),
                None => continue,
            }
        };
        object.properties.insert(name, value);
    }
    Ok(Some(DecodedObject { object, deferred }))
}

fn first_uri(grouped: &BTreeMap<String, PropertyRows>, name: &str) -> Option<String> {
    grouped
        .get(name)?
        .values
        .first()?
        .0
        .as_str()
        .map(str::to_string)
}

fn broken<T>(options: &ReadOptions, uri: &str, message: String) -> VitalSqlResult<Option<T>> {
    if options.ignore_broken_data {
        log::error!("dropping broken object {uri}: {message}");
        Ok(None)
    } else {
        Err(VitalSqlError::integrity(message))
    }
}

/// Checks the persisted domain version against the loaded one. Returns a namespace
/// rewrite map when the persisted version matches a side-loaded older ontology.
fn reconcile_version(
    uri: &str,
    grouped: &BTreeMap<String, PropertyRows>,
    registry: &Registry,
    options: &ReadOptions,
) -> VitalSqlResult<Option<BTreeMap<String, String>>> {
    let Some(ontology_iri) = first_uri(grouped, vocab::HAS_ONTOLOGY_IRI) else {
        return Ok(None);
    };
    let Some(version_raw) = first_uri(grouped, vocab::HAS_VERSION_IRI) else {
        return Ok(None);
    };
    let persisted = DomainVersion::parse(&version_raw)?;
    if let Some(map) = registry.old_version_map(&ontology_iri, persisted) {
        return Ok(Some(map));
    }
    let Some(current) = registry.ontology(&ontology_iri) else {
        log::error!("domain ontology {ontology_iri} of object {uri} is not loaded");
        return Ok(None);
    };
    if current.version == persisted {
        return Ok(None);
    }
    let message = format!(
        "object {uri} persisted with {ontology_iri} {persisted}, loaded version is {}",
        current.version
    );
    match options.enforcement {
        VersionEnforcement::Strict => {
            let compatible = persisted < current.version
                && current
                    .backward_compatible
                    .is_some_and(|minimum| persisted >= minimum);
            if compatible {
                log::debug!("{message}, accepted as backward compatible");
                Ok(None)
            } else {
                Err(VitalSqlError::version_conflict(message))
            }
        }
        VersionEnforcement::Tolerant | VersionEnforcement::Lenient => {
            log::warn!("{message}");
            Ok(None)
        }
    }
}

/// Groups URI-ordered or unordered rows by URI and rebuilds each object.
pub fn decode_batch(
    rows: Vec<EavRow>,
    registry: &Registry,
    options: &ReadOptions,
) -> VitalSqlResult<Vec<DecodedObject>> {
    let mut order = Vec::new();
    let mut by_uri: HashMap<String, Vec<EavRow>> = HashMap::new();
    for row in rows {
        if !by_uri.contains_key(&row.uri) {
            order.push(row.uri.clone());
        }
        by_uri.entry(row.uri.clone()).or_default().push(row);
    }
    let mut out = Vec::with_capacity(order.len());
    for uri in order {
        if let Some(rows) = by_uri.remove(&uri)
            && let Some(decoded) = from_rows(rows, registry, options)?
        {
            out.push(decoded);
        }
    }
    Ok(out)
}

/// Single-pass decoder over rows sorted by URI. Only the last flushed URI is kept, so an
/// object whose rows reappear after a later URI is reported instead of being split.
pub struct StreamDecoder<'a> {
    registry: &'a Registry,
    options: ReadOptions,
    current: Vec<EavRow>,
    last_flushed: Option<String>,
}

impl<'a> StreamDecoder<'a> {
    pub fn new(registry: &'a Registry, options: ReadOptions) -> Self {
        Self {
            registry,
            options,
            current: Vec::new(),
            last_flushed: None,
        }
    }

    /// Feeds one row; returns the previous object once its rows are complete.
    pub fn push(&mut self, row: EavRow) -> VitalSqlResult<Option<DecodedObject>> {
        let same = self
            .current
            .first()
            .is_some_and(|first| first.uri == row.uri);
        if same {
            self.current.push(row);
            return Ok(None);
        }
        let finished = self.flush()?;
        if let Some(last) = &self.last_flushed
            && row.uri.as_str() <= last.as_str()
        {
            return Err(VitalSqlError::integrity(format!(
                "rows for {} arrived out of order after {last}",
                row.uri
            )));
        }
        self.current.push(row);
        Ok(finished)
    }

    pub fn finish(mut self) -> VitalSqlResult<Option<DecodedObject>> {
        self.flush()
    }

    fn flush(&mut self) -> VitalSqlResult<Option<DecodedObject>> {
        if self.current.is_empty() {
            return Ok(None);
        }
        let rows = std::mem::take(&mut self.current);
        self.last_flushed = Some(rows[0].uri.clone());
        from_rows(rows, self.registry, &self.options)
    }
}

/// Replaces deferred overflow markers with fetched full text.
/// `texts` maps (uri, stored property name) to full-text values in row order.
pub fn resolve_deferred(
    decoded: &mut DecodedObject,
    texts: &mut HashMap<(String, String), Vec<String>>,
) -> VitalSqlResult<()> {
    for pending in decoded.deferred.drain(..) {
        let key = (pending.uri.clone(), pending.stored_name.clone());
        let text = texts
            .get_mut(&key)
            .and_then(|values| (!values.is_empty()).then(|| values.remove(0)))
            .ok_or_else(|| {
                VitalSqlError::integrity(format!(
                    "missing full text for {} on {}",
                    pending.property, pending.uri
                ))
            })?;
        let Some(slot) = decoded.object.properties.get_mut(&pending.property) else {
            continue;
        };
        let target = match slot {
            PropertyValue::Single(value) => Some(value),
            PropertyValue::Multi(values) => values.iter_mut().find(|value| codec::is_overflow(value)),
        };
        if let Some(target) = target {
            *target = codec::with_kind(pending.kind, &text);
        }
    }
    Ok(())
}
