//! Core vocabulary URIs the persistence layer treats specially.

pub const VITAL_CORE_NS: &str = "http://vital.ai/ontology/vital-core";
pub const VITAL_AIMP_NS: &str = "http://vital.ai/ontology/vital-aimp";

pub const CORE_VERSION: &str = "0.2.304";

pub const VITALTYPE: &str = "http://vital.ai/ontology/vital-core#vitaltype";
pub const TYPES: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const URI_PROP: &str = "http://vital.ai/ontology/vital-core#URIProp";
pub const HAS_ONTOLOGY_IRI: &str = "http://vital.ai/ontology/vital-core#hasOntologyIRI";
pub const HAS_VERSION_IRI: &str = "http://vital.ai/ontology/vital-core#hasVersionIRI";
pub const HAS_TIMESTAMP: &str = "http://vital.ai/ontology/vital-core#hasTimestamp";
pub const HAS_CHANNEL_URI: &str = "http://vital.ai/ontology/vital-aimp#hasChannelURI";

pub const VITAL_GRAPH_CONTAINER_OBJECT: &str =
    "http://vital.ai/ontology/vital-core#VITAL_GraphContainerObject";
pub const VITAL_NODE: &str = "http://vital.ai/ontology/vital-core#VITAL_Node";
pub const AIMP_MESSAGE: &str = "http://vital.ai/ontology/vital-aimp#AIMPMessage";

/// Pseudo property accepted in criteria and sort directives for the object URI.
pub const URI: &str = "URI";
/// Pseudo sort property selecting per-segment scan order.
pub const INDEX_ORDER: &str = "INDEXORDER";
/// Pseudo sort property for full-text relevance, which relational segments cannot rank.
pub const RELEVANCE: &str = "RELEVANCE";

/// Properties consumed while reconstructing an object rather than assigned to it.
pub fn is_structural(property: &str) -> bool {
    matches!(
        property,
        VITALTYPE | TYPES | URI_PROP | HAS_ONTOLOGY_IRI | HAS_VERSION_IRI
    )
}
