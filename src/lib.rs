//! Image upload API and channel-splitting worker.
//!
//! The API stores uploads in a source bucket and hands back presigned URLs;
//! the worker reacts to creation events on that bucket and writes red, green,
//! blue, grayscale and inverted variants to a destination bucket.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
