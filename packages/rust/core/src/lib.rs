//! Core transformation pipeline and session logic for ClearMind.
//!
//! This crate turns free-form text into structured, validated results via a
//! language model, and drives the per-feature idle/loading/success/error
//! state that the presentation layer renders.

pub mod companion;
pub mod contract;
pub mod credential;
pub mod dashboard;
pub mod focus;
pub mod pipeline;
pub mod request;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;
