pub mod properties_model;
pub mod properties_shared;

pub use properties_model::{NewProperty, Property, PropertyPatch, PropertyStatus, PropertyType};
