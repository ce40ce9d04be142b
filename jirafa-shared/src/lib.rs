pub mod api;
pub mod auth;
pub mod domain;
pub mod growth;
pub mod jwt;
pub mod path;
