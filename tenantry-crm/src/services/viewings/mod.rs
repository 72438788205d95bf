pub mod viewings_model;
pub mod viewings_shared;

pub use viewings_model::{NewViewing, Viewing, ViewingPatch, DEFAULT_VIEWING_STATUS};
