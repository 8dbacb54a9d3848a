//! Request-independent business logic shared by the HTTP routes.

pub mod conversation;
