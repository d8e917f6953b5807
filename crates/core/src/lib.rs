//! Domain logic for the thematic annotation curation service.
//!
//! Everything in this crate is pure: no I/O, no database access. The
//! `thematic-db` crate persists the entities these modules reason about and
//! the `thematic-api` crate exposes them over HTTP.

pub mod annotation;
pub mod classifier;
pub mod error;
pub mod labels;
pub mod palette;
pub mod types;
