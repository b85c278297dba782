pub mod api;
pub mod criteria;
pub mod error;
pub mod object;
pub mod ontology;
pub mod query;
pub mod value;
pub mod vocab;

pub use api::*;
pub use criteria::*;
pub use error::{VitalSqlError, VitalSqlResult};
pub use object::*;
pub use ontology::*;
pub use query::*;
pub use value::*;
