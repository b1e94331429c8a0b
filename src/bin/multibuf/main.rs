#![deny(
    dead_code,
    deprecated,
    future_incompatible,
    missing_copy_implementations,
    missing_debug_implementations,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

const EXPANDED_VERSION: &str = concat!(
    "v",
    env!("CARGO_PKG_VERSION"),
    env!("MULTIBUF_BUILD_GIT_HASH"),
);

mod bench;
mod cli;
mod config;
mod error;

use cli::Cli;

// musl's allocator is noticeably slower than glibc's, and the bench command
// allocates a buffer per job slot per round. jemalloc doesn't support i686,
// so only 64-bit targets get it.
#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> Result<(), error::Context> {
    init_logging();
    Cli::run()
}
