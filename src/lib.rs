pub mod auth;
pub mod config;
pub mod extract;
pub mod gmail;
pub mod html;
pub mod pipeline;
