// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

pub mod repository_factory;
pub mod tank_repository;
pub mod tank_service;
pub mod unit_of_work;

pub use repository_factory::Platform;
pub use tank_repository::EventSourcedTankRepository;
pub use tank_service::{CommandOutcome, ServiceError, TankCommandService};
pub use unit_of_work::{CommitReport, CommitWarning, UnitOfWork};
