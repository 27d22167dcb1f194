//! HTTP route handlers for the JSON API.

pub mod health;
pub mod posts;
