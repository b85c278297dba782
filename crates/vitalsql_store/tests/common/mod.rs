#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use vitalsql_store::{
    ClassDef, DomainVersion, ExecutionMode, GraphObject, OntologyDef, PropertyDef, QueryConfig,
    Registry, Segment, SegmentApi, Value, ValueKind, VitalSqlConfig, VitalSqlStore, vocab,
};

pub const SHOP: &str = "http://example.org/ontology/shop";

pub fn shop(local: &str) -> String {
    format!("{SHOP}#{local}")
}

pub fn product_class() -> String {
    shop("Product")
}

pub fn review_class() -> String {
    shop("Review")
}

pub fn notice_class() -> String {
    shop("Notice")
}

pub fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry
        .with_ontology(OntologyDef::new(SHOP, DomainVersion::new(1, 0, 0)).importing(vocab::VITAL_CORE_NS))
        .with_class(ClassDef::new(product_class(), SHOP).extends(vocab::VITAL_NODE))
        .with_class(ClassDef::new(review_class(), SHOP).extends(vocab::VITAL_NODE))
        .with_class(ClassDef::new(notice_class(), SHOP).extends(vocab::AIMP_MESSAGE))
        .with_class(ClassDef::new(shop("Bundle"), SHOP).extends(vocab::VITAL_GRAPH_CONTAINER_OBJECT))
        .with_property(PropertyDef::new(shop("hasName"), ValueKind::String, SHOP))
        .with_property(PropertyDef::new(shop("hasPrice"), ValueKind::Double, SHOP))
        .with_property(PropertyDef::new(shop("hasQuantity"), ValueKind::Integer, SHOP))
        .with_property(PropertyDef::new(shop("hasSku"), ValueKind::Long, SHOP))
        .with_property(PropertyDef::new(shop("hasWeight"), ValueKind::Float, SHOP))
        .with_property(PropertyDef::new(shop("hasActive"), ValueKind::Boolean, SHOP))
        .with_property(PropertyDef::new(shop("hasRating"), ValueKind::Truth, SHOP))
        .with_property(PropertyDef::new(shop("hasReleased"), ValueKind::Date, SHOP))
        .with_property(PropertyDef::new(shop("hasLocation"), ValueKind::GeoLocation, SHOP))
        .with_property(PropertyDef::new(shop("hasWebsite"), ValueKind::Uri, SHOP))
        .with_property(PropertyDef::new(shop("hasNotes"), ValueKind::Other, SHOP))
        .with_property(PropertyDef::new(shop("hasDescription"), ValueKind::String, SHOP))
        .with_property(PropertyDef::new(shop("hasTags"), ValueKind::String, SHOP).multi());
    Arc::new(registry)
}

pub fn sqlite_config(base: &Path) -> VitalSqlConfig {
    VitalSqlConfig::default_sqlite(base.join("store.sqlite").to_string_lossy())
}

pub fn config_with(base: &Path, probing: bool, fold_types: bool, mode: ExecutionMode) -> VitalSqlConfig {
    let mut config = sqlite_config(base);
    config.query = Some(QueryConfig {
        probing: Some(probing),
        fold_types: Some(fold_types),
        execution_mode: Some(mode),
        ignore_broken_data: Some(false),
    });
    config
}

pub async fn open(config: &VitalSqlConfig, base: &Path) -> VitalSqlStore {
    VitalSqlStore::connect(config, base, registry())
        .await
        .expect("connect")
}

pub async fn segment(store: &VitalSqlStore, id: &str) -> Segment {
    let segment = Segment::new(id, format!("urn:segment:{id}"));
    store.add_segment(&segment).await.expect("add segment");
    segment
}

pub fn product(id: &str, name: &str, price: f64, tags: &[&str]) -> GraphObject {
    GraphObject::new(format!("urn:product:{id}"), product_class())
        .with(shop("hasName"), name)
        .with(shop("hasPrice"), price)
        .with_multi(
            shop("hasTags"),
            tags.iter().map(|tag| Value::String(tag.to_string())).collect(),
        )
}

pub fn review(id: &str, name: &str) -> GraphObject {
    GraphObject::new(format!("urn:review:{id}"), review_class()).with(shop("hasName"), name)
}

/// A message-class object, so its rows carry the timestamp and channel columns.
pub fn notice(id: &str, timestamp: i64, channel: &str) -> GraphObject {
    GraphObject::new(format!("urn:notice:{id}"), notice_class())
        .with(vocab::HAS_TIMESTAMP, timestamp)
        .with(vocab::HAS_CHANNEL_URI, Value::Uri(channel.to_string()))
        .with(shop("hasName"), id)
}
