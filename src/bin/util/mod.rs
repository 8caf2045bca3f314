use std::env;
use std::process;

use crate::ghc;
use tracing_subscriber::EnvFilter;

pub fn run<F: FnOnce() -> ghc::Result<()>>(f: F) {
    let filter = env::var("GHC_LOG").unwrap_or_else(|_| "info".to_owned());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_ansi(atty::is(atty::Stream::Stdout))
        .init();

    if let Err(e) = f() {
        error!("{:?}", e);
        process::exit(1);
    }
}
