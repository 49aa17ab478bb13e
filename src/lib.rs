//! The _certkeeper_ library crate.
//!
//! Manages certificate authorities kept in a directory tree: creating root
//! and intermediate CAs, issuing certificates and signing requests, and
//! maintaining each CA's certificate revocation list.

pub mod ca;
pub mod cli;
pub mod commons;
pub mod config;
pub mod constants;
