//! # rolo-search
//!
//! Finding people in a contact list.
//!
//! This crate provides:
//! - Edit-distance name similarity with reordered-token handling
//! - Duplicate candidate search over one owner's contacts
//! - Natural-language queries translated into validated filters
//!
//! ## Example
//!
//! ```ignore
//! use rolo_search::{DuplicateFinder, NlQueryEngine};
//!
//! let finder = DuplicateFinder::new(contacts.clone());
//! let candidates = finder.find_candidates("user_1", "Sarah Chen").await?;
//!
//! let engine = NlQueryEngine::new(extractor, contacts);
//! let answer = engine.answer("user_1", "Who works at Stripe?").await?;
//! ```

pub mod duplicates;
pub mod nl_query;
pub mod similarity;

pub use duplicates::{rank_candidates, DuplicateConfig, DuplicateFinder};
pub use nl_query::{
    build_answer_context, format_contact_summary, no_match_message, validate_spec, NlQueryEngine,
    QueryResult, DEFAULT_QUERY_SUMMARY,
};
pub use similarity::{name_similarity, similarity};
