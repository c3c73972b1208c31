pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod models;
pub mod mutation;
pub mod notify;
pub mod refresh;
pub mod remote;
pub mod state;
