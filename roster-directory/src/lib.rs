//! # roster-directory
//!
//! The boundary between the reconciliation engine and a directory service.
//!
//! [`DirectoryClient`] is the seam the engine calls through. This crate ships
//! one implementation, [`MemoryDirectory`], which evaluates a subset of LDAP
//! search filters ([`filter`]) and can be loaded from and saved to a JSON
//! [`snapshot`] for offline planning.

pub mod client;
pub mod error;
pub mod filter;
pub mod memory;
pub mod snapshot;

pub use client::{DirectoryClient, Endpoint};
pub use error::DirectoryError;
pub use filter::Filter;
pub use memory::{
    DirectoryCall, DirectoryObject, MemoryDirectory, MutationKind, ObjectClass, Operation,
    ServerDirectory,
};
