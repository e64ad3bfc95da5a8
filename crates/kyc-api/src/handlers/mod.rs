//! Route handlers, one module per resource.

pub mod admin;
pub mod sessions;
pub mod users;
pub mod webhooks;
