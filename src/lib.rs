//! Knoll: Client-Side Indexing State for Remote File Pickers
//!
//! Tracks which knowledge bases each remote resource belongs to, reconciles
//! that local knowledge against fetched folder listings without losing
//! membership, validates selections against knowledge-base consistency
//! rules, and coordinates the remote create/sync/delete workflows.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod merge;
pub mod picker;
pub mod remote;
pub mod selection;
pub mod types;
