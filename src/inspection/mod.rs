//! Gravsearch type inspection

pub mod inspector;
pub mod result;

pub use inspector::{TypeInspectionError, TypeInspectionResult, TypeInspector};
pub use result::{AnnotatedQuery, GravsearchTypeInspectionResult, InferredType, TypeableEntity};
