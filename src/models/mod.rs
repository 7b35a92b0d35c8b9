//! Data models shared by the API and the transform worker.
//!
//! None of these types are persisted on their own; the object store holds
//! only keys and bytes, and these types describe the keys, the HTTP bodies
//! and the event notifications that flow between the two processes.

pub mod api;
pub mod event;
pub mod variant;
