//! Common types used by the various certkeeper components.

pub mod crypto;
pub mod storage;
