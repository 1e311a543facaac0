//! Wire types shared between the workflow client crates.

pub mod domain;
pub mod error;
pub mod protocol;
