pub mod contacts_model;
pub mod contacts_shared;

pub use contacts_model::{Contact, ContactPatch, NewContact};
