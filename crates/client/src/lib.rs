//! Medibook client library.
//!
//! Everything a Medibook front end needs beyond rendering: who the user is,
//! what is in their cart, and how a checkout moves from cart review to a
//! placed order.
//!
//! # Architecture
//!
//! - [`auth::AuthSession`] owns the bearer token and the signed-in identity
//! - [`cart::CartSync`] keeps the local cart in step with the server using
//!   optimistic updates with rollback or resync
//! - [`checkout::CheckoutWizard`] is the five-step checkout state machine and
//!   places the order
//! - [`orders::OrderHistory`] and [`catalog::Catalog`] back the profile and
//!   browsing views
//! - [`state::Medibook`] wires the services together around one
//!   [`api::LabApi`] backend, one persisted [`storage::SessionStore`] and one
//!   [`navigation::Navigator`]
//!
//! The HTTP backend is [`api::HttpApi`]; tests substitute their own
//! [`api::LabApi`] implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod navigation;
pub mod orders;
pub mod poll;
pub mod state;
pub mod storage;

pub use error::{ClientError, Result};
pub use state::Medibook;
