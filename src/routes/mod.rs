pub mod admin;
pub mod auth;
pub mod pricing;
pub mod subscription;
