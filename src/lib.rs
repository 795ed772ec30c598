//! Read-only streamer analytics over a MongoDB collection.
//!
//! The `data` layer and [`pipeline::render`] are independent of the UI; the
//! binary drives them once per frame.

pub mod color;
pub mod config;
pub mod data;
pub mod pipeline;
