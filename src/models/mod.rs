//! Domain models for addresses, year archives, services, readings and users.

pub mod address;
pub mod document;
pub mod month;
pub mod reading;
pub mod user;
pub mod utility;
pub mod year;
