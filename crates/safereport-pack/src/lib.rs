//! # safereport-pack
//!
//! Defense packs: signed, point-in-time snapshots of a report's chain
//! verification, rendered out of process.
//!
//! ## Overview
//!
//! A pack asserts "at time T, verifying report R produced result V".  The
//! snapshot is signed with the pack key ring (distinct from the chain keys)
//! and handed to an external renderer through object storage and a job
//! queue.  The renderer reports back through [`PackPipeline::reconcile`].
//!
//! Stored states are `queued`, `generated` and `failed`; the last two are
//! final.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pipeline = PackPipeline::new(chain, packs, inputs, queue, directory, clock, signer)
//!     .configured(&settings);
//!
//! let outcome = pipeline.request(&report_id, "audit")?;
//! // ... later, from the renderer:
//! pipeline.reconcile(Some(token), &callback)?;
//! ```

pub mod memory;
pub mod pipeline;
pub mod signer;

pub use memory::{InMemoryPackStore, InMemoryRenderInputStore, InMemoryRenderQueue, StaticReportDirectory};
pub use pipeline::{CallbackSecret, PackPipeline, LIST_LIMIT, STALE_TAG};
pub use signer::PackSigner;

// ── Tests ─────────────────────────────────────────────────────────────────────
