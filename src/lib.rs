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
#![allow(clippy::module_name_repetitions)]

//! Multi-buffer scheduling of independent hash and cipher jobs.
//!
//! A [`Manager`] owns a ring of job slots and one out-of-order engine per
//! algorithm family. Jobs are taken with [`Manager::get_next_job`], filled
//! in and submitted; an engine only does work once all of its lanes are
//! occupied, so a partial batch needs an explicit [`Manager::flush_job`].
//! Finished jobs come back carrying whatever `user_data` they went in with.
//!
//! ```
//! use multibuf::{HashAlg, Manager, Status};
//!
//! let mut manager = Manager::new()?;
//! let msg = b"abc";
//! let mut tag = [0u8; 32];
//! let mut job = manager.get_next_job()?;
//! job.hash_alg = HashAlg::Sha256;
//! job.src = Some(msg);
//! job.hash_len = msg.len();
//! job.auth_tag = Some(&mut tag);
//! job.user_data = 1;
//! let done = match manager.submit_job(job) {
//!     Ok(Some(done)) => done,
//!     Ok(None) => manager.flush_job().expect("one job outstanding"),
//!     Err(rejected) => panic!("{rejected}"),
//! };
//! assert_eq!((done.user_data, done.status()), (1, Status::Completed));
//! drop(done);
//! assert_eq!(tag[0], 0xba);
//! # Ok::<(), multibuf::ErrorCode>(())
//! ```

pub mod arch;
mod error;
mod job;
mod manager;
mod ooo;
pub mod selftest;
mod validate;

pub use arch::{Arch, Features, Lanes};
pub use crypto_common::erase::clear_mem;
pub use error::{strerror, BurstRejected, ErrorCode, Rejected};
pub use job::{
    AuthKey, ChainOrder, CipherDirection, CipherKey, CipherMode, Family, HashAlg, Job, Status,
};
pub use manager::{Builder, Manager, Retire, CAPACITY, MAX_BURST_SIZE, MAX_LANES};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
