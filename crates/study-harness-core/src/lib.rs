//! # Study Harness Core
//!
//! Shared, I/O-free logic for Study Harness: data models, sentence
//! chunking, the session store abstraction, relevance selection, prompt
//! assembly, and quiz parsing.
//!
//! This crate contains no tokio, HTTP, filesystem, or database
//! dependencies. Source extraction, network collaborators, and the HTTP
//! surface live in the `study-harness` app crate.

pub mod chunk;
pub mod error;
pub mod models;
pub mod prompt;
pub mod quiz;
pub mod select;
pub mod store;
pub mod text;

pub use error::StudyError;
