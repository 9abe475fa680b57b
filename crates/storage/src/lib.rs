// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for the supervisor service.
//!
//! One SQLite database owns all persisted state: instances, their event and
//! command streams, checkpoints, active spawns, and encrypted secrets.

mod events;
mod gateway;
mod instances;
mod schema;
mod secrets;
mod spawns;

pub use events::EventStore;
pub use gateway::{Gateway, StorageError};
pub use instances::{InstanceLookup, InstanceStore};
pub use schema::SCHEMA_VERSION;
pub use secrets::{SecretAccess, SecretInfo, SecretMeta, SecretStore};
pub use spawns::{SpawnRecord, SpawnStatus, SpawnStore};
