// Linkshelf shared type definitions
// Each submodule defines types used across the reconciler, stores and services.

pub mod bookmark;
pub mod errors;
pub mod event;
pub mod metadata;
pub mod session;
pub mod settings;
