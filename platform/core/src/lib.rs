// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! AquaControl core
//!
//! Event-sourced management of aquaculture tanks and their sensors.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Modules:** `domain` (aggregate, events, ports), `application`
//!   (repository, unit of work, command service), `infrastructure`
//!   (event stores, read models, event bus, database)

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
