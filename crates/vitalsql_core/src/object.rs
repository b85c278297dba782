use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vocab;
use crate::{PropertyValue, Value, VitalSqlError, VitalSqlResult};

/// A typed graph object: a URI, its concrete class and a bag of typed properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphObject {
    pub uri: String,
    pub vitaltype: String,
    /// RDF types, vitaltype first.
    pub types: Vec<String>,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl GraphObject {
    pub fn new(uri: impl Into<String>, vitaltype: impl Into<String>) -> Self {
        let vitaltype = vitaltype.into();
        Self {
            uri: uri.into(),
            types: vec![vitaltype.clone()],
            vitaltype,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        let type_uri = type_uri.into();
        if !self.types.contains(&type_uri) {
            self.types.push(type_uri);
        }
        self
    }

    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(property, value);
        self
    }

    pub fn with_multi(mut self, property: impl Into<String>, values: Vec<Value>) -> Self {
        self.properties
            .insert(property.into(), PropertyValue::Multi(values));
        self
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        self.properties
            .insert(property.into(), PropertyValue::Single(value.into()));
    }

    pub fn get(&self, property: &str) -> Option<&PropertyValue> {
        self.properties.get(property)
    }

    pub fn timestamp(&self) -> Option<i64> {
        match self.get(vocab::HAS_TIMESTAMP)?.first()? {
            Value::Long(value) | Value::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn validate(&self) -> VitalSqlResult<()> {
        if self.uri.trim().is_empty() {
            return Err(VitalSqlError::query("object URI must not be empty"));
        }
        if self.vitaltype.trim().is_empty() {
            return Err(VitalSqlError::query(format!(
                "object {} has no vitaltype",
                self.uri
            )));
        }
        if self.types.first() != Some(&self.vitaltype) {
            return Err(VitalSqlError::query(format!(
                "object {} types must start with its vitaltype",
                self.uri
            )));
        }
        Ok(())
    }
}
