#![deny(unused_must_use)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate tracing;

pub mod document;
pub mod events;
pub mod fetch;
pub mod github;
pub mod pagination;
pub mod policy;
pub mod processor;
pub mod queue;
pub mod request;
pub mod store;
pub mod urn;

pub static USER_AGENT: &str = concat!("rust-ops/github-crawler ", env!("CARGO_PKG_VERSION"));

pub type Result<T> = std::result::Result<T, anyhow::Error>;
