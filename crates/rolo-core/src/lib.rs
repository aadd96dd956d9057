//! # rolo-core
//!
//! Core types, traits, and abstractions for rolodex.
//!
//! This crate provides the contact and review data model, the query spec
//! types, the error taxonomy, and the collaborator traits that the other
//! rolodex crates implement or consume.

pub mod defaults;
pub mod error;
pub mod models;
pub mod query;
pub mod timeout;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use query::*;
pub use timeout::bounded;
pub use traits::*;
