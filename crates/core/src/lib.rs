//! Domain types shared by the persistence and HTTP layers.
//!
//! Nothing in this crate performs I/O: it holds the annotation vocabulary,
//! payload validation, identifier rules, and the domain error type.

pub mod annotation;
pub mod error;
pub mod naming;
pub mod types;
