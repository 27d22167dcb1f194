//! Request middleware: route guards and origin checks.

pub mod guard;
pub mod origin;
