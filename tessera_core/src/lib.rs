//! Core value representation for the Tessera object model.
//!
//! This crate provides:
//! - NaN-boxed immediate values (`Value`, `ValueKind`)
//! - Global string interning with pointer-identity keys (`InternedString`)
//!
//! Nothing here knows about object layout; the shape machinery in
//! `tessera_object` builds on these primitives.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod intern;
pub mod value;

// Re-export commonly used items
pub use intern::{InternedString, intern};
pub use value::{Value, ValueKind};
