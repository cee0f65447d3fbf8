//! Core types and trait definitions for the penny donation ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::LedgerStore`]; the API layer depends on
//! that abstraction only.

pub mod beneficiary;
pub mod campaign;
pub mod checkout;
pub mod donation;
pub mod error;
pub mod member;
pub mod store;

pub use error::{Classify, Error, ErrorKind, Result};
