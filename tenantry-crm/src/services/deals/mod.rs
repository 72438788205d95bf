pub mod deals_model;
pub mod deals_shared;

pub use deals_model::{Deal, DealPatch, DealStage, NewDeal};
