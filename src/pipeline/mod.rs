//! Pipeline stages: input resolution → page source → local recognition →
//! cloud escalation → text cleanup.
//!
//! Each stage is its own module with a narrow interface. The orchestrator in
//! [`crate::engine`] wires them together; no stage calls another directly.

pub mod cloud;
pub mod escalate;
pub mod input;
pub mod local;
pub mod postprocess;
pub mod source;
