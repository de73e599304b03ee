//! Row models and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and, where rows are inserted by the API, a create DTO.

pub mod annotation;
pub mod game;
pub mod image;
pub mod lease;
pub mod user;
