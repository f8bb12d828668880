//! Business logic services.

pub mod access;
pub mod auth;
pub mod dashboard;
pub mod reading;
pub mod utility;
