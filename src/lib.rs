//! # Mission orchestration engine
//!
//! The core engine behind an autonomous multi-agent research system: given
//! a natural-language research request and a corpus of ingested documents
//! (plus optional web search), it plans a structured report outline,
//! iteratively researches each section by dispatching agents that call
//! LLMs and tools, accumulates evidence as typed notes, and produces a
//! cited long-form report.
//!
//! This crate implements the engine only: the Mission Controller, Agent
//! Dispatch & Scheduling, the Retrieval-Augmented Search fabric, and the
//! Live Progress Bus. It does not implement an HTTP/WebSocket surface,
//! document ingestion, or concrete embedding/reranker/LLM provider
//! clients beyond the narrow interface contracts those concerns are
//! expected to satisfy.
//!
//! ## Modules
//!
//! - [`core`]: the mission/plan/note domain model shared by everything else.
//! - [`storage`]: `SQLite`-backed persistence for missions, execution logs,
//!   notes, and the externally ingested document/embedding corpus.
//! - [`search`]: the single-query hybrid dense+sparse search primitive
//!   (`crate::retrieval` builds multi-query aggregation and reranking on
//!   top of it).
//! - [`retrieval`]: hybrid dense+sparse search over the document corpus.
//! - [`tools`]: the tool suite agents can call mid-loop (document search,
//!   web search, web fetch, file read, calculator).
//! - [`agent`]: the LLM provider abstraction and the six specialized
//!   agent units (Planner, Researcher, Reflection, Writer, Note Assigner,
//!   Messenger).
//! - [`mission`]: the Mission Controller, Agent Dispatch & Scheduling,
//!   Settings Resolver, and Auto-Optimizer.
//! - [`progress`]: the Live Progress Bus.
//! - [`io`]: filesystem helpers backing the File Reader tool.
//! - [`cli`]: a thin local driver for creating, starting, and inspecting
//!   missions.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod agent;
pub mod cli;
pub mod core;
pub mod embedding;
pub mod error;
pub mod io;
pub mod mission;
pub mod progress;
pub mod retrieval;
pub mod search;
pub mod storage;
pub mod tools;

pub use error::{Error, Result};

pub use core::{
    ChunkMetadata, ExecutionLogEntry, LogStatus, Mission, MissionMetadata, MissionStatus, Note,
    Pads, Plan, PlanStep, Relevance, RetrievalChunk, Section, SourceType, StepAction, UsageRecord,
};
pub use core::{ChunkId, DocId, LogId, MissionId, NoteId, SectionId, StepId};

pub use storage::{DEFAULT_DB_PATH, SqliteStorage, Storage};

#[cfg(feature = "fastembed-embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use embedding::{
    DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder, cosine_similarity, create_embedder,
};

pub use retrieval::{RetrievalEngine, RetrievalQuery, Reranker};

pub use mission::{MissionController, UserContext};

pub use cli::{Cli, Commands, OutputFormat};
