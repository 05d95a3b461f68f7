//! Shared building blocks for the confidential-filesystem key broker:
//! addressing, seed bundles, the error taxonomy, wire types and the
//! JSON-RPC API trait implemented by the server.

pub mod address;
pub mod commands;
pub mod crypto;
pub mod errors;
pub mod kind;
pub mod request_types;
pub mod rpc;
pub mod seed;

pub use address::Address;
pub use commands::CommandBundle;
pub use errors::Error;
pub use kind::ResourceKind;
pub use request_types::*;
pub use seed::{SeedBundle, SubSeed, ValidatedSeeds};
