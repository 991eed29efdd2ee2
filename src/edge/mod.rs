//! Edge-side commands wrapping calls to the middle tier.

pub mod middletier;

pub use middletier::{middletier_keys, MiddleTierCommand, MiddleTierError, FALLBACK_TEXT};
