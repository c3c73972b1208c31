pub mod auth;
pub mod data;
pub mod leads;
pub mod ui;
