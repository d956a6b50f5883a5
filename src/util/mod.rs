//! Utility functions
//!
//! Pure helpers - time, randomization.

pub mod rand;
pub mod time;
