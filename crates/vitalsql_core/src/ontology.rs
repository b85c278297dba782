use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vocab;
use crate::{ValueKind, VitalSqlError, VitalSqlResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DomainVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl DomainVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(raw: &str) -> VitalSqlResult<Self> {
        let mut parts = raw.trim().split('.');
        let mut next = || -> VitalSqlResult<u32> {
            parts
                .next()
                .ok_or_else(|| VitalSqlError::version_conflict(format!("invalid version: {raw}")))?
                .parse::<u32>()
                .map_err(|_| VitalSqlError::version_conflict(format!("invalid version: {raw}")))
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(VitalSqlError::version_conflict(format!(
                "invalid version: {raw}"
            )));
        }
        Ok(version)
    }

    /// Namespace suffix for a side-loaded older ontology version.
    pub fn to_suffix(self) -> String {
        format!("_v{}_{}_{}", self.major, self.minor, self.patch)
    }
}

impl Ord for DomainVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for DomainVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DomainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A URI split into its versionless form and the version encoded in its namespace, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedUri {
    pub versionless: String,
    pub version: Option<DomainVersion>,
}

impl VersionedUri {
    pub fn analyze(uri: &str) -> Self {
        let (namespace, fragment) = match uri.split_once('#') {
            Some((namespace, fragment)) => (namespace, Some(fragment)),
            None => (uri, None),
        };
        let Some((base, version)) = split_version_suffix(namespace) else {
            return Self {
                versionless: uri.to_string(),
                version: None,
            };
        };
        let versionless = match fragment {
            Some(fragment) => format!("{base}#{fragment}"),
            None => base.to_string(),
        };
        Self {
            versionless,
            version: Some(version),
        }
    }
}

fn split_version_suffix(namespace: &str) -> Option<(&str, DomainVersion)> {
    let idx = namespace.rfind("_v")?;
    let (base, suffix) = namespace.split_at(idx);
    let mut parts = suffix[2..].split('_');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() || base.is_empty() {
        return None;
    }
    Some((base, DomainVersion::new(major, minor, patch)))
}

/// Strips the older-version namespace suffix so writes always use current vocabulary.
pub fn versionless(uri: &str) -> String {
    VersionedUri::analyze(uri).versionless
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OntologyDef {
    pub uri: String,
    pub version: DomainVersion,
    pub backward_compatible: Option<DomainVersion>,
    pub imports: Vec<String>,
}

impl OntologyDef {
    pub fn new(uri: impl Into<String>, version: DomainVersion) -> Self {
        Self {
            uri: uri.into(),
            version,
            backward_compatible: None,
            imports: Vec::new(),
        }
    }

    pub fn backward_compatible_with(mut self, version: DomainVersion) -> Self {
        self.backward_compatible = Some(version);
        self
    }

    pub fn importing(mut self, uri: impl Into<String>) -> Self {
        self.imports.push(uri.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub uri: String,
    pub parent: Option<String>,
    pub ontology: String,
    pub container: bool,
}

impl ClassDef {
    pub fn new(uri: impl Into<String>, ontology: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            parent: None,
            ontology: ontology.into(),
            container: false,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub uri: String,
    pub kind: ValueKind,
    pub multi_valued: bool,
    pub parent: Option<String>,
    pub ontology: String,
}

impl PropertyDef {
    pub fn new(uri: impl Into<String>, kind: ValueKind, ontology: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            kind,
            multi_valued: false,
            parent: None,
            ontology: ontology.into(),
        }
    }

    pub fn multi(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// Read-only snapshot of the domain metadata: ontologies, classes and properties.
#[derive(Clone, Debug)]
pub struct Registry {
    ontologies: HashMap<String, OntologyDef>,
    older: HashMap<String, OntologyDef>,
    classes: HashMap<String, ClassDef>,
    properties: HashMap<String, PropertyDef>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let core_version = DomainVersion::parse(vocab::CORE_VERSION)
            .unwrap_or_else(|_| DomainVersion::new(0, 0, 0));
        let mut registry = Self {
            ontologies: HashMap::new(),
            older: HashMap::new(),
            classes: HashMap::new(),
            properties: HashMap::new(),
        };
        registry
            .with_ontology(OntologyDef::new(vocab::VITAL_CORE_NS, core_version))
            .with_ontology(
                OntologyDef::new(vocab::VITAL_AIMP_NS, core_version).importing(vocab::VITAL_CORE_NS),
            )
            .with_class(ClassDef::new(vocab::VITAL_NODE, vocab::VITAL_CORE_NS))
            .with_class(
                ClassDef::new(vocab::VITAL_GRAPH_CONTAINER_OBJECT, vocab::VITAL_CORE_NS).container(),
            )
            .with_class(ClassDef::new(vocab::AIMP_MESSAGE, vocab::VITAL_AIMP_NS))
            .with_property(PropertyDef::new(
                vocab::VITALTYPE,
                ValueKind::Uri,
                vocab::VITAL_CORE_NS,
            ))
            .with_property(
                PropertyDef::new(vocab::TYPES, ValueKind::Uri, vocab::VITAL_CORE_NS).multi(),
            )
            .with_property(PropertyDef::new(
                vocab::URI_PROP,
                ValueKind::Uri,
                vocab::VITAL_CORE_NS,
            ))
            .with_property(PropertyDef::new(
                vocab::HAS_ONTOLOGY_IRI,
                ValueKind::Uri,
                vocab::VITAL_CORE_NS,
            ))
            .with_property(PropertyDef::new(
                vocab::HAS_VERSION_IRI,
                ValueKind::String,
                vocab::VITAL_CORE_NS,
            ))
            .with_property(PropertyDef::new(
                vocab::HAS_TIMESTAMP,
                ValueKind::Long,
                vocab::VITAL_CORE_NS,
            ))
            .with_property(PropertyDef::new(
                vocab::HAS_CHANNEL_URI,
                ValueKind::Uri,
                vocab::VITAL_AIMP_NS,
            ));
        registry
    }

    pub fn with_ontology(&mut self, ontology: OntologyDef) -> &mut Self {
        self.ontologies.insert(ontology.uri.clone(), ontology);
        self
    }

    /// Registers an older version of a domain side by side with the current one. Its
    /// classes and properties are expected under the `<domain>_v<x>_<y>_<z>` namespace.
    pub fn with_older_version(&mut self, ontology: OntologyDef) -> &mut Self {
        let key = format!("{}{}", ontology.uri, ontology.version.to_suffix());
        self.older.insert(key, ontology);
        self
    }

    pub fn with_class(&mut self, class: ClassDef) -> &mut Self {
        self.classes.insert(class.uri.clone(), class);
        self
    }

    pub fn with_property(&mut self, property: PropertyDef) -> &mut Self {
        self.properties.insert(property.uri.clone(), property);
        self
    }

    pub fn ontology(&self, uri: &str) -> Option<&OntologyDef> {
        self.ontologies.get(uri)
    }

    pub fn older_version(&self, uri: &str, version: DomainVersion) -> Option<&OntologyDef> {
        self.older
            .get(&format!("{uri}{}", version.to_suffix()))
            .filter(|def| def.uri == uri)
    }

    pub fn class(&self, uri: &str) -> Option<&ClassDef> {
        self.classes.get(uri)
    }

    pub fn property(&self, uri: &str) -> Option<&PropertyDef> {
        self.properties.get(uri)
    }

    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(class);
        while let Some(uri) = current {
            if uri == ancestor {
                return true;
            }
            if !seen.insert(uri) {
                return false;
            }
            current = self.classes.get(uri).and_then(|def| def.parent.as_deref());
        }
        false
    }

    /// Whether the class (or an ancestor) is a container type accepting external properties.
    pub fn is_container(&self, class: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.classes.get(class);
        while let Some(def) = current {
            if def.container {
                return true;
            }
            if !seen.insert(def.uri.as_str()) {
                return false;
            }
            current = def.parent.as_deref().and_then(|parent| self.classes.get(parent));
        }
        false
    }

    /// Transitive subclasses, sorted, optionally including the class itself.
    pub fn subclasses(&self, class: &str, include_self: bool) -> Vec<String> {
        descendants(
            class,
            include_self,
            self.classes
                .values()
                .map(|def| (def.uri.as_str(), def.parent.as_deref())),
        )
    }

    pub fn subproperties(&self, property: &str, include_self: bool) -> Vec<String> {
        descendants(
            property,
            include_self,
            self.properties
                .values()
                .map(|def| (def.uri.as_str(), def.parent.as_deref())),
        )
    }

    /// Namespace rewrites (`current -> older`) for a persisted domain version that matches a
    /// side-loaded older ontology, covering the domain and its versioned import tree.
    pub fn old_version_map(
        &self,
        domain: &str,
        version: DomainVersion,
    ) -> Option<BTreeMap<String, String>> {
        let older = self.older_version(domain, version)?;
        let mut map = BTreeMap::new();
        map.insert(
            domain.to_string(),
            format!("{domain}{}", version.to_suffix()),
        );
        let mut pending = older.imports.clone();
        let mut seen = HashSet::new();
        while let Some(import) = pending.pop() {
            if !seen.insert(import.clone()) {
                continue;
            }
            let analyzed = VersionedUri::analyze(&import);
            let Some(import_version) = analyzed.version else {
                continue;
            };
            map.insert(analyzed.versionless.clone(), import.clone());
            if let Some(def) = self.older_version(&analyzed.versionless, import_version) {
                pending.extend(def.imports.iter().cloned());
            }
        }
        Some(map)
    }
}

fn descendants<'a>(
    root: &str,
    include_self: bool,
    edges: impl Iterator<Item = (&'a str, Option<&'a str>)>,
) -> Vec<String> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for (uri, parent) in edges {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(uri);
        }
    }
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut pending = vec![root];
    while let Some(uri) = pending.pop() {
        if !seen.insert(uri) {
            continue;
        }
        if uri != root || include_self {
            out.push(uri.to_string());
        }
        if let Some(next) = children.get(uri) {
            pending.extend(next.iter().copied());
        }
    }
    out.sort();
    out
}

/// Rewrites a URI from the current namespace into a side-loaded older one.
pub fn to_old_version(uri: &str, map: &BTreeMap<String, String>) -> String {
    for (current, older) in map {
        if let Some(rest) = uri.strip_prefix(&format!("{current}#")) {
            return format!("{older}#{rest}");
        }
    }
    uri.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "http://example.org/ontology/app";

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .with_ontology(OntologyDef::new(DOMAIN, DomainVersion::new(2, 0, 0)))
            .with_class(ClassDef::new(format!("{DOMAIN}#Animal"), DOMAIN).extends(vocab::VITAL_NODE))
            .with_class(ClassDef::new(format!("{DOMAIN}#Dog"), DOMAIN).extends(format!("{DOMAIN}#Animal")))
            .with_class(ClassDef::new(format!("{DOMAIN}#Puppy"), DOMAIN).extends(format!("{DOMAIN}#Dog")))
            .with_property(PropertyDef::new(format!("{DOMAIN}#hasName"), ValueKind::String, DOMAIN))
            .with_property(
                PropertyDef::new(format!("{DOMAIN}#hasNickName"), ValueKind::String, DOMAIN)
                    .extends(format!("{DOMAIN}#hasName")),
            );
        registry
    }

    #[test]
    fn parses_and_orders_versions() {
        let version = DomainVersion::parse("1.10.2").expect("version");
        assert_eq!(version, DomainVersion::new(1, 10, 2));
        assert!(version > DomainVersion::new(1, 9, 99));
        assert_eq!(version.to_string(), "1.10.2");
        assert!(DomainVersion::parse("1.2").is_err());
        assert!(DomainVersion::parse("1.2.3.4").is_err());
    }

    #[test]
    fn analyzes_versioned_uris() {
        let analyzed = VersionedUri::analyze(&format!("{DOMAIN}_v1_2_3#hasName"));
        assert_eq!(analyzed.versionless, format!("{DOMAIN}#hasName"));
        assert_eq!(analyzed.version, Some(DomainVersion::new(1, 2, 3)));
        let plain = VersionedUri::analyze("http://example.org/my_var#x");
        assert_eq!(plain.version, None);
        assert_eq!(versionless("urn:plain"), "urn:plain");
    }

    #[test]
    fn hierarchy_lookups_are_transitive() {
        let registry = registry();
        let animal = format!("{DOMAIN}#Animal");
        let subclasses = registry.subclasses(&animal, true);
        assert_eq!(subclasses.len(), 3);
        assert!(subclasses.contains(&animal));
        assert_eq!(registry.subclasses(&animal, false).len(), 2);
        assert!(registry.is_subclass_of(&format!("{DOMAIN}#Puppy"), vocab::VITAL_NODE));
        assert!(!registry.is_subclass_of(vocab::VITAL_NODE, &animal));
        assert_eq!(
            registry.subproperties(&format!("{DOMAIN}#hasName"), false),
            vec![format!("{DOMAIN}#hasNickName")]
        );
    }

    #[test]
    fn old_version_map_follows_versioned_imports() {
        let mut registry = registry();
        let base = "http://example.org/ontology/base";
        registry
            .with_older_version(
                OntologyDef::new(DOMAIN, DomainVersion::new(1, 0, 0))
                    .importing(format!("{base}_v0_5_0")),
            )
            .with_older_version(OntologyDef::new(base, DomainVersion::new(0, 5, 0)));
        let map = registry
            .old_version_map(DOMAIN, DomainVersion::new(1, 0, 0))
            .expect("older version loaded");
        assert_eq!(map.get(DOMAIN).map(String::as_str), Some(&*format!("{DOMAIN}_v1_0_0")));
        assert_eq!(map.get(base).map(String::as_str), Some(&*format!("{base}_v0_5_0")));
        assert_eq!(
            to_old_version(&format!("{base}#hasThing"), &map),
            format!("{base}_v0_5_0#hasThing")
        );
        assert!(registry.old_version_map(DOMAIN, DomainVersion::new(1, 1, 0)).is_none());
    }

    #[test]
    fn core_vocabulary_is_prepopulated() {
        let registry = Registry::new();
        assert!(registry.property(vocab::HAS_TIMESTAMP).is_some());
        assert!(registry.is_container(vocab::VITAL_GRAPH_CONTAINER_OBJECT));
        assert!(!registry.is_container(vocab::VITAL_NODE));
    }
}
