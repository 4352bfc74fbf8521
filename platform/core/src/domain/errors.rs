// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Errors
//!
//! Command-time and replay-time failures raised by the tank aggregate.
//!
//! | Error | Raised by | Recovery |
//! |-------|-----------|----------|
//! | [`DomainError::Validation`] | malformed command input | caller fixes input |
//! | [`DomainError::InvariantViolation`] | business rule broken | caller changes intent |
//! | [`ReconstructionError`] | corrupt or out-of-order event stream | none, hard failure |
//!
//! Neither variant of `DomainError` leaves a trace on the aggregate: a failing
//! command emits no event and mutates nothing.

use thiserror::Error;

use crate::domain::tank::TankId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

/// Fatal failure while rebuilding a tank from its stored history.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconstructionError {
    #[error("Event stream for tank {tank_id} does not start with TankCreated (found {found})")]
    MissingCreationEvent { tank_id: TankId, found: String },

    #[error("Event stream for tank {tank_id} contains a second TankCreated at version {version}")]
    DuplicateCreationEvent { tank_id: TankId, version: u64 },

    #[error("Event at version {version} belongs to tank {found}, expected {expected}")]
    ForeignEvent {
        expected: TankId,
        found: TankId,
        version: u64,
    },

    #[error("Event {event_type} at version {version} of tank {tank_id} is malformed: {reason}")]
    MalformedEvent {
        tank_id: TankId,
        version: u64,
        event_type: String,
        reason: String,
    },

    #[error("Event stream for tank {tank_id} is out of order: expected version {expected}, found {found}")]
    VersionGap {
        tank_id: TankId,
        expected: u64,
        found: u64,
    },
}
