// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod aggregator;
pub mod ai;
pub mod photos;
pub mod pickup;
pub mod route;

pub use aggregator::{apply_completion, CompletionOutcome, CREDITS_PER_PICKUP};
pub use ai::AiGateway;
pub use photos::PhotoStore;
pub use pickup::PickupService;
