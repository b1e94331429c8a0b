//! Throughput measurement: one manager per worker thread, each pushing
//! rounds of jobs through its own slot ring.

use crate::{config::Config, error::Error};
use log::{debug, info};
use multibuf::{
    clear_mem, AuthKey, ChainOrder, CipherKey, CipherMode, HashAlg, Job, Status, CAPACITY,
};
use parking_lot::Mutex;
use rand_core::{OsRng, RngCore};
use std::{
    fmt::Display,
    str::FromStr,
    time::{Duration, Instant},
};

/// What a benchmark job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alg {
    Hash(HashAlg),
    Chacha20,
    /// Encrypt, then authenticate the ciphertext.
    Chacha20Hmac(HashAlg),
}

impl Default for Alg {
    fn default() -> Self {
        Self::Hash(HashAlg::Sha256)
    }
}

const NAMES: [(&str, Alg); 11] = [
    ("sha224", Alg::Hash(HashAlg::Sha224)),
    ("sha256", Alg::Hash(HashAlg::Sha256)),
    ("sha384", Alg::Hash(HashAlg::Sha384)),
    ("sha512", Alg::Hash(HashAlg::Sha512)),
    ("hmac-sha224", Alg::Hash(HashAlg::HmacSha224)),
    ("hmac-sha256", Alg::Hash(HashAlg::HmacSha256)),
    ("hmac-sha384", Alg::Hash(HashAlg::HmacSha384)),
    ("hmac-sha512", Alg::Hash(HashAlg::HmacSha512)),
    ("chacha20", Alg::Chacha20),
    ("chacha20-hmac-sha256", Alg::Chacha20Hmac(HashAlg::HmacSha256)),
    ("chacha20-hmac-sha512", Alg::Chacha20Hmac(HashAlg::HmacSha512)),
];

impl Alg {
    const fn hash(self) -> HashAlg {
        match self {
            Self::Hash(alg) | Self::Chacha20Hmac(alg) => alg,
            Self::Chacha20 => HashAlg::Null,
        }
    }

    const fn cipher(self) -> CipherMode {
        match self {
            Self::Chacha20 | Self::Chacha20Hmac(_) => CipherMode::Chacha20,
            Self::Hash(_) => CipherMode::Null,
        }
    }
}

impl FromStr for Alg {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, alg)| *alg)
            .ok_or(())
    }
}

impl Display for Alg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = NAMES
            .iter()
            .find(|(_, alg)| alg == self)
            .map_or("?", |(name, _)| name);
        f.write_str(name)
    }
}

/// Key material and input shared by every job of one worker.
struct Inputs {
    alg: Alg,
    src: Vec<u8>,
    cipher_key: CipherKey,
    auth_key: Option<AuthKey>,
    nonce: [u8; chacha20::NONCE_SIZE],
}

impl Inputs {
    fn random(alg: Alg, size: usize) -> Result<Self, Error> {
        let mut src = vec![0; size];
        OsRng.fill_bytes(&mut src);
        let mut key = [0; chacha20::KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        let auth_key = match alg.hash() {
            h if h.is_hmac() => Some(AuthKey::new(h, &key)?),
            _ => None,
        };
        let cipher_key = CipherKey::new(key);
        clear_mem(&mut key);
        let mut nonce = [0; chacha20::NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        Ok(Self {
            alg,
            src,
            cipher_key,
            auth_key,
            nonce,
        })
    }

    fn fill<'a>(&'a self, job: &mut Job<'a>, dst: &'a mut [u8], tag: &'a mut [u8]) {
        let hash = self.alg.hash();
        job.src = Some(self.src.as_slice());
        job.hash_alg = hash;
        job.cipher_mode = self.alg.cipher();
        if job.cipher_mode != CipherMode::Null {
            job.cipher_key = Some(&self.cipher_key);
            job.iv = Some(&self.nonce);
            job.cipher_len = self.src.len();
            job.dst = Some(dst);
            job.chain_order = ChainOrder::CipherHash;
        }
        if hash != HashAlg::Null {
            job.hash_len = self.src.len();
            job.auth_key = self.auth_key.as_ref();
            job.auth_tag = Some(&mut tag[..hash.digest_len()]);
        }
    }
}

#[derive(Debug, Default)]
struct Totals {
    jobs: usize,
    bytes: usize,
    busy: Duration,
}

fn check(job: &Job<'_>) -> Result<(), Error> {
    match job.status() {
        Status::Completed => Ok(()),
        status => Err(Error::JobFailed {
            slot: job.slot(),
            status,
        }),
    }
}

/// Pushes `jobs` jobs through one manager in rounds of at most
/// [`CAPACITY`], building a fresh manager per round so that each round
/// borrows the output buffers afresh.
fn worker(config: &Config, totals: &Mutex<Totals>) -> Result<(), Error> {
    let bench = config.bench();
    let inputs = Inputs::random(bench.alg, bench.size)?;
    let mut dsts = vec![vec![0u8; bench.size]; CAPACITY];
    let mut tags = vec![[0u8; 64]; CAPACITY];
    let builder = config.builder();
    let mut left = bench.jobs;
    let start = Instant::now();
    while left > 0 {
        let n = left.min(CAPACITY);
        let mut buffers = dsts.iter_mut().zip(tags.iter_mut());
        let mut manager = builder.build()?;
        let mut completed = 0;
        if bench.burst == 0 {
            for (dst, tag) in buffers.by_ref().take(n) {
                let mut job = manager.get_next_job()?;
                inputs.fill(&mut job, dst, tag);
                if let Some(job) = manager.submit_job(job)? {
                    check(&job)?;
                    completed += 1;
                }
            }
        } else {
            let mut submitted = 0;
            while submitted < n {
                let mut jobs = manager.get_next_burst(bench.burst.min(n - submitted))?;
                for (job, (dst, tag)) in jobs.iter_mut().zip(buffers.by_ref()) {
                    inputs.fill(job, dst, tag);
                }
                submitted += jobs.len();
                for job in manager.submit_burst(jobs)? {
                    check(&job)?;
                    completed += 1;
                }
            }
        }
        for job in std::iter::from_fn(|| manager.flush_job()) {
            check(&job)?;
            completed += 1;
        }
        if completed != n {
            return Err(Error::Lost {
                submitted: n,
                completed,
            });
        }
        left -= n;
    }
    let busy = start.elapsed();
    let mut totals = totals.lock();
    totals.jobs += bench.jobs;
    totals.bytes += bench.jobs * bench.size;
    totals.busy += busy;
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
pub fn run(config: &Config) -> Result<(), Error> {
    let bench = config.bench();
    let builder = config.builder();
    let probe = builder.build()?;
    info!(
        "{} x {} bytes on {} thread(s), arch {}, burst {}",
        bench.jobs,
        bench.size,
        bench.threads,
        probe.arch(),
        bench.burst
    );
    debug!("{probe:?}");
    drop(probe);

    let totals = Mutex::new(Totals::default());
    let start = Instant::now();
    std::thread::scope(|s| {
        let workers: Vec<_> = (0..bench.threads)
            .map(|_| s.spawn(|| worker(config, &totals)))
            .collect();
        workers
            .into_iter()
            .try_for_each(|w| w.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
    })?;
    let wall = start.elapsed();
    let totals = totals.into_inner();
    let mib = totals.bytes as f64 / (1024.0 * 1024.0);
    let secs = wall.as_secs_f64();
    println!(
        "{}: {} jobs, {mib:.1} MiB in {secs:.3}s",
        bench.alg, totals.jobs
    );
    println!(
        "  {:.1} MiB/s, {:.0} jobs/s ({:.3}s busy across threads)",
        mib / secs,
        totals.jobs as f64 / secs,
        totals.busy.as_secs_f64()
    );
    Ok(())
}
