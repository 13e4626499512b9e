//! BoxForge Shared - code used on both sides of the VM boundary
//!
//! This crate contains the error type, the staging-area layout and the
//! constants that the host-side build stage and the in-VM forge stage
//! must agree on.

pub mod constants;
pub mod errors;
pub mod layout;

pub use errors::{ForgeError, ForgeResult};
pub use layout::StagingLayout;
