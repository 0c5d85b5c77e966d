//! Database record structures and request/response structs.
//!
//! These types define the contract between the store traits and their
//! callers. They are distinct from the API models in
//! [`crate::api::models`], allowing the storage representation to evolve
//! independently of the public API.

pub mod summaries;
pub mod users;
