// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Veilport Systems

//! # warden-std
//!
//! `std`-only storage backends for `warden-core`.
//!
//! This crate provides [`FileTrustStore`], a JSON file-backed implementation
//! of the [`TrustStore`] trait suitable for CLI tools, local agents, and
//! server-side deployments that do not need a full database.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use warden_std::storage::FileTrustStore;
//! use warden_core::{AdmissionEngine, config::Config};
//!
//! let storage = FileTrustStore::open("/var/lib/warden/trust.json")
//!     .expect("failed to open trust store");
//!
//! let mut engine = AdmissionEngine::new(Config::default(), storage);
//! ```
//!
//! [`TrustStore`]: warden_core::TrustStore

pub mod storage;

pub use storage::file::FileTrustStore;
