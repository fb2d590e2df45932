// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lingora Core - Storage Layer for the Version Lifecycle
//!
//! This crate provides the durable storage layer the release/rollback engine
//! is built on: version records, the mutable translation draft (languages +
//! translations), workflow instance bookkeeping with checkpoints, and the
//! artifact store holding published snapshots and recovery backups.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      lingora-engine                          │
//! │          (Release Workflow, Rollback Workflow)               │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼                                   ▼
//! ┌───────────────────────┐        ┌────────────────────────────┐
//! │     Persistence       │        │       ArtifactStore        │
//! │  (This Crate)         │        │  (This Crate)              │
//! │  versions/languages/  │        │  {version}/{locale}.json   │
//! │  translations/        │        │  {version}/backup.gz       │
//! │  instances/checkpoints│        └────────────────────────────┘
//! └───────────────────────┘                      │
//!            │                                   ▼
//!            ▼                        filesystem / in-memory
//!   PostgreSQL / SQLite
//! ```
//!
//! # Version State Machine
//!
//! ```text
//!        first edit since last publish
//!                    │
//!                    ▼
//!               ┌─────────┐
//!               │  DRAFT  │
//!               └────┬────┘
//!                    │ promote (release, after artifacts persisted)
//!                    ▼
//!               ┌─────────┐   promote of a newer version
//!               │  LIVE   │──────────────────────────────┐
//!               └─────────┘                              ▼
//!                    ▲                             ┌──────────┐
//!                    └─────────────────────────────│ ARCHIVED │
//!                      promote (rollback replay)   └──────────┘
//! ```
//!
//! At most one version is `live` and at most one is `draft` at any time.
//! `promote_version` archives the current live row and flips the target row
//! to live as one transaction; both halves are idempotent so a retry from the
//! same workflow step is always safe. Version records are never deleted.
//!
//! # Modules
//!
//! - [`error`]: Unified error type with stable error codes
//! - [`persistence`]: The `Persistence` trait plus SQLite and PostgreSQL backends
//! - [`artifacts`]: The `ArtifactStore` trait plus filesystem and in-memory backends

#![deny(missing_docs)]

/// Error types for storage operations with stable error code mapping.
pub mod error;

/// Database operations for versions, languages, translations, instances, and checkpoints.
pub mod persistence;

/// Durable object storage for published snapshots and recovery backups.
pub mod artifacts;

pub use error::CoreError;
pub use persistence::{
    CheckpointRecord, InstanceRecord, InstanceStatus, LanguageRecord, Persistence,
    PostgresPersistence, SqlitePersistence, TranslationRow, VersionRecord, VersionStatus,
};

pub use artifacts::{ArtifactStore, FsArtifactStore, MemoryArtifactStore, PutOptions};
