//! # Study Harness
//!
//! Content ingestion and retrieval for an AI study assistant.
//!
//! A user loads one source (an uploaded document, a web page, or a YouTube
//! transcript). It is normalized, split into sentence-respecting chunks,
//! and held in a per-user session cache. Questions then select the most
//! relevant chunks under a prompt budget and are answered by an external
//! text generator; quiz requests produce a validated five-question quiz.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌─────────┐   ┌──────────────┐
//! │ Upload/Web/  │──▶│ Normalizer │──▶│ Chunker │──▶│ SessionCache │
//! │ Transcript   │   └────────────┘   └─────────┘   └──────┬───────┘
//! └──────────────┘                                         │
//!            ┌─────────────────────────────────────────────┘
//!            ▼
//!     ┌──────────┐   ┌────────┐   ┌───────────────┐   ┌──────────────┐
//!     │ Selector │──▶│ Prompt │──▶│ TextGenerator │──▶│ answer/quiz  │
//!     └──────────┘   └────────┘   └───────────────┘   └──────────────┘
//! ```
//!
//! The pure pipeline (models, chunking, session store, selection, prompts,
//! quiz parsing) lives in `study-harness-core`; this crate adds I/O.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF/DOCX/TXT text extraction |
//! | [`web`] | Bounded page fetch and HTML text extraction |
//! | [`transcript`] | YouTube id parsing and caption fetch |
//! | [`normalize`] | Source normalization and upload spooling |
//! | [`generate`] | Text-generation providers |
//! | [`study`] | Load/chat/reset orchestration |
//! | [`history`] | Creation history |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod extract;
pub mod generate;
pub mod history;
pub mod migrate;
pub mod normalize;
pub mod server;
pub mod study;
pub mod transcript;
pub mod web;
