//! Ecoreport library.
//!
//! Backend for community contamination reporting: accounts and tokens,
//! user management, and reports, events, publications and companies.

pub mod api;
pub mod auth;
pub mod content;
pub mod db;
pub mod user;
