//! HTTP handlers, one module per resource.

pub mod admin;
pub mod catalog;
pub mod health;
pub mod payments;
pub mod scan;
pub mod tickets;
