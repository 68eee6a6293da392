//! Core types for Medibook.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod patient;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use patient::{Gender, ParseEnumError, Relation, TimeSlot};
pub use price::Price;
pub use status::*;
