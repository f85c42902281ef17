//! # safereport-core
//!
//! The seams of the evidence integrity subsystem.
//!
//! This crate provides:
//! - The collaborator traits (`ChainStore`, `PackStore`, `RenderQueue`, …)
//! - A `Clock` abstraction with a manual clock for deterministic tests
//! - The `KeyRing` that maps key ids to keyed-hash material
//!
//! ## Usage
//!
//! ```rust,ignore
//! use safereport_core::{keyring::{KeyRing, SecretKey}, traits::ChainStore};
//! ```

pub mod clock;
pub mod keyring;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use keyring::{KeyRing, SecretKey};
