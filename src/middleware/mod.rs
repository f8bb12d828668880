//! Request extractors for authentication, role checks and enveloped rejections.

pub mod auth;
pub mod extract;
pub mod rbac;
