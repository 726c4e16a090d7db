//! Request middleware shared by the auth routes.

pub mod csrf;
