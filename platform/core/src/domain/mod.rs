// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: the tank aggregate, its events, and the persistence ports it
//! is stored through.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure business rules, free of I/O

pub mod errors;
pub mod events;
pub mod platform_config;
pub mod projection;
pub mod repository;
pub mod sensor;
pub mod tank;
pub mod value_objects;
