//! Shared utilities for the titledb workspace.
//!
//! The two leaves of the update protocol live here: [`hash`] (integrity
//! verification of downloaded files) and [`atomic`] (crash-safe replacement of
//! installed files with rollback).

pub mod atomic;
pub mod bytes;
pub mod error;
pub mod fs;
pub mod hash;
pub mod path;
pub mod time;
mod user;
