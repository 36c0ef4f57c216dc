pub mod assume_role;
pub mod auth;
pub mod browser;
pub mod config;
pub mod discovery;
pub mod federation;
pub mod http;
pub mod login;
pub mod run;
pub mod select;
pub mod store;
pub mod token_cache;

#[cfg(test)]
mod testing;
