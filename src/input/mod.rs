//! Input contracts: the logical key enumeration and the resize flag.
//!
//! Raw byte decoding lives outside the core; editing logic consumes only
//! these types.

pub mod keys;
pub mod resize;
