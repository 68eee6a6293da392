//! Medibook Core - Shared domain types.
//!
//! This crate provides the types shared by every Medibook component:
//! - `client` - Session, cart and checkout logic against the Medibook API
//! - `cli` - Terminal front end for browsing, cart and checkout
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices and emails, plus the
//!   enumerations collected during checkout

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
