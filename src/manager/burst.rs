use super::{Manager, CAPACITY, MAX_BURST_SIZE};
use crate::{
    error::{BurstRejected, ErrorCode},
    job::{CipherDirection, CipherMode, HashAlg, Job},
    validate,
};
use log::debug;

impl<'a> Manager<'a> {
    /// Up to `n` blank jobs on distinct free slots. Fewer come back when the
    /// ring is short; none are reserved.
    pub fn get_next_burst(&mut self, n: usize) -> Result<Vec<Job<'a>>, ErrorCode> {
        if n > MAX_BURST_SIZE {
            return Err(self.fail(ErrorCode::BurstSize));
        }
        Ok(self.free_from_cursor().take(n).map(Job::new).collect())
    }

    /// Validates every job before accepting any. One bad job rejects the
    /// whole burst, and every job comes back in its original order.
    ///
    /// Returns whatever finished, which may be fewer jobs than were
    /// submitted; the rest are picked up with
    /// [`get_completed_job`](Self::get_completed_job) or a flush.
    pub fn submit_burst(&mut self, jobs: Vec<Job<'a>>) -> Result<Vec<Job<'a>>, BurstRejected<'a>> {
        match self.check_burst(&jobs) {
            Ok(()) => Ok(self.submit_burst_nocheck(jobs)),
            Err((index, error)) => {
                debug!("rejected burst of {} at job {index}: {error}", jobs.len());
                Err(BurstRejected {
                    error: self.fail(error),
                    index,
                    jobs,
                })
            }
        }
    }

    fn check_burst(&self, jobs: &[Job<'a>]) -> Result<(), (usize, ErrorCode)> {
        if jobs.len() > MAX_BURST_SIZE {
            return Err((MAX_BURST_SIZE, ErrorCode::BurstSize));
        }
        let mut seen = [false; CAPACITY];
        for (index, job) in jobs.iter().enumerate() {
            let slot = job.slot();
            if seen[slot] {
                return Err((index, ErrorCode::BurstOoo));
            }
            if self.busy[slot] {
                return Err((index, ErrorCode::SlotInUse));
            }
            validate::job(job).map_err(|e| (index, e))?;
            seen[slot] = true;
        }
        Ok(())
    }

    /// Accepts every job without validating it, then drains whatever has
    /// finished.
    pub fn submit_burst_nocheck(&mut self, jobs: Vec<Job<'a>>) -> Vec<Job<'a>> {
        let mut out = Vec::with_capacity(jobs.len());
        for job in jobs {
            out.extend(self.submit_job_nocheck(job));
        }
        out.extend(std::iter::from_fn(|| self.get_completed_job()));
        out
    }

    /// Forces up to `max` jobs to completion.
    pub fn flush_burst(&mut self, max: usize) -> Vec<Job<'a>> {
        std::iter::from_fn(|| self.flush_job()).take(max).collect()
    }

    /// A burst of cipher-only jobs. `mode` and `direction` are applied to
    /// every job and any hash stage is dropped. A bad selection rejects the
    /// burst at index 0.
    pub fn submit_cipher_burst(
        &mut self,
        mut jobs: Vec<Job<'a>>,
        mode: CipherMode,
        direction: CipherDirection,
        key_len: usize,
    ) -> Result<Vec<Job<'a>>, BurstRejected<'a>> {
        let selection = match mode {
            CipherMode::Null => Err(ErrorCode::CipherMode),
            CipherMode::Chacha20 if key_len != chacha20::KEY_SIZE => Err(ErrorCode::JobKeyLen),
            CipherMode::Chacha20 => Ok(()),
        };
        if let Err(error) = selection {
            debug!("rejected {mode:?} burst with {key_len}-byte key: {error}");
            return Err(BurstRejected {
                error: self.fail(error),
                index: 0,
                jobs,
            });
        }
        stamp_cipher(&mut jobs, mode, direction);
        self.submit_burst(jobs)
    }

    /// [`submit_cipher_burst`](Self::submit_cipher_burst) without any
    /// checks. `key_len` is taken on trust.
    pub fn submit_cipher_burst_nocheck(
        &mut self,
        mut jobs: Vec<Job<'a>>,
        mode: CipherMode,
        direction: CipherDirection,
        _key_len: usize,
    ) -> Vec<Job<'a>> {
        stamp_cipher(&mut jobs, mode, direction);
        self.submit_burst_nocheck(jobs)
    }

    /// A burst of hash-only jobs, all using `alg`. Any cipher stage is
    /// dropped.
    pub fn submit_hash_burst(
        &mut self,
        mut jobs: Vec<Job<'a>>,
        alg: HashAlg,
    ) -> Result<Vec<Job<'a>>, BurstRejected<'a>> {
        if alg == HashAlg::Null {
            return Err(BurstRejected {
                error: self.fail(ErrorCode::HashAlg),
                index: 0,
                jobs,
            });
        }
        stamp_hash(&mut jobs, alg);
        self.submit_burst(jobs)
    }

    pub fn submit_hash_burst_nocheck(
        &mut self,
        mut jobs: Vec<Job<'a>>,
        alg: HashAlg,
    ) -> Vec<Job<'a>> {
        stamp_hash(&mut jobs, alg);
        self.submit_burst_nocheck(jobs)
    }
}

fn stamp_cipher(jobs: &mut [Job<'_>], mode: CipherMode, direction: CipherDirection) {
    for job in jobs {
        job.cipher_mode = mode;
        job.cipher_direction = direction;
        job.hash_alg = HashAlg::Null;
    }
}

fn stamp_hash(jobs: &mut [Job<'_>], alg: HashAlg) {
    for job in jobs {
        job.hash_alg = alg;
        job.cipher_mode = CipherMode::Null;
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        arch::Arch,
        error::ErrorCode,
        job::{CipherDirection, CipherKey, CipherMode, HashAlg, Job, Status},
        manager::{Builder, Manager, MAX_BURST_SIZE},
    };
    use sha2::{Digest, Sha512};

    fn manager<'a>() -> Manager<'a> {
        Builder::default().arch(Arch::NoAesni).width(4).build().unwrap()
    }

    #[test]
    fn burst_size_limit() {
        let mut m = manager();
        assert_eq!(
            m.get_next_burst(MAX_BURST_SIZE + 1).err(),
            Some(ErrorCode::BurstSize)
        );
        assert_eq!(m.get_next_burst(5).unwrap().len(), 5);
    }

    #[test]
    fn duplicate_slot_rejects_whole_burst() {
        let mut m = manager();
        let mut jobs = m.get_next_burst(3).unwrap();
        let again = m.get_next_job().unwrap();
        jobs.push(again);
        for (i, job) in jobs.iter_mut().enumerate() {
            job.user_data = i as u64;
        }
        let rejected = m.submit_burst(jobs).unwrap_err();
        assert_eq!(rejected.error, ErrorCode::BurstOoo);
        assert_eq!(rejected.index, 3);
        let order: Vec<u64> = rejected.jobs.iter().map(|j| j.user_data).collect();
        assert_eq!(order, [0, 1, 2, 3]);
        assert_eq!(m.queue_size(), 0);
    }

    #[test]
    fn invalid_job_rejects_whole_burst() {
        let mut m = manager();
        let mut jobs = m.get_next_burst(4).unwrap();
        jobs[2].hash_alg = HashAlg::Sha512;
        let rejected = m.submit_burst(jobs).unwrap_err();
        assert_eq!(rejected.error, ErrorCode::JobNullAuth);
        assert_eq!(rejected.index, 2);
        assert_eq!(m.free_slots(), super::CAPACITY);
    }

    #[test]
    fn partial_returns_add_up() {
        let src = [0x33u8; 100];
        let mut tags = [[0u8; 32]; 6];
        let mut m = manager();
        let mut jobs: Vec<Job<'_>> = m.get_next_burst(6).unwrap();
        for (job, tag) in jobs.iter_mut().zip(tags.iter_mut()) {
            job.hash_alg = HashAlg::Sha256;
            job.src = Some(&src);
            job.hash_len = src.len();
            job.auth_tag = Some(tag);
        }
        let first = m.submit_burst(jobs).unwrap();
        // one full batch of four
        assert!(first.len() <= 4);
        let rest = m.flush_burst(usize::MAX);
        assert_eq!(first.len() + rest.len(), 6);
        assert!(first
            .iter()
            .chain(&rest)
            .all(|j| j.status() == Status::Completed));
        assert!(m.flush_burst(1).is_empty());
    }

    #[test]
    fn cipher_burst_applies_selection() {
        let src: Vec<Vec<u8>> = (1..=3).map(|n| vec![0x11; 40 * n]).collect();
        let mut dst = vec![[0u8; 120]; 3];
        let key = CipherKey::new([7; 32]);
        let nonce = [3u8; 12];
        let mut m = manager();
        let mut jobs = m.get_next_burst(3).unwrap();
        for ((job, src), dst) in jobs.iter_mut().zip(&src).zip(dst.iter_mut()) {
            // overridden by the burst
            job.hash_alg = HashAlg::Sha256;
            job.cipher_key = Some(&key);
            job.iv = Some(&nonce);
            job.src = Some(src);
            job.cipher_len = src.len();
            job.dst = Some(dst);
        }
        let mut done = m
            .submit_cipher_burst(jobs, CipherMode::Chacha20, CipherDirection::Encrypt, 32)
            .unwrap();
        done.extend(m.flush_burst(usize::MAX));
        assert_eq!(done.len(), 3);
        assert!(done.iter().all(|j| j.status() == Status::Completed));
        drop(done);
        drop(m);
        for (src, dst) in src.iter().zip(&dst) {
            let mut want = src.clone();
            chacha20::ChaCha20::new(&[7; 32], &nonce).apply_keystream(&mut want);
            assert_eq!(dst[..src.len()], want[..]);
        }
    }

    #[test]
    fn cipher_burst_rejects_bad_selection() {
        let mut m = manager();
        let jobs = m.get_next_burst(2).unwrap();
        let rejected = m
            .submit_cipher_burst(jobs, CipherMode::Chacha20, CipherDirection::Encrypt, 16)
            .unwrap_err();
        assert_eq!((rejected.error, rejected.index), (ErrorCode::JobKeyLen, 0));
        assert_eq!(rejected.jobs.len(), 2);
        let rejected = m
            .submit_cipher_burst(rejected.jobs, CipherMode::Null, CipherDirection::Decrypt, 32)
            .unwrap_err();
        assert_eq!(rejected.error, ErrorCode::CipherMode);
        assert_eq!(m.last_error(), Some(ErrorCode::CipherMode));
        assert_eq!(m.queue_size(), 0);
    }

    #[test]
    fn hash_burst_applies_selection() {
        let msgs: Vec<Vec<u8>> = (0..5).map(|n| vec![0x61; 100 * n]).collect();
        let mut tags = [[0u8; 64]; 5];
        let mut m = manager();
        let mut jobs = m.get_next_burst(5).unwrap();
        for ((job, msg), tag) in jobs.iter_mut().zip(&msgs).zip(tags.iter_mut()) {
            // overridden by the burst
            job.cipher_mode = CipherMode::Chacha20;
            job.src = Some(msg);
            job.hash_len = msg.len();
            job.auth_tag = Some(tag);
        }
        let mut done = m.submit_hash_burst(jobs, HashAlg::Sha512).unwrap();
        done.extend(m.flush_burst(usize::MAX));
        assert_eq!(done.len(), 5);
        assert!(done.iter().all(|j| j.status() == Status::Completed));
        drop(done);
        drop(m);
        for (msg, tag) in msgs.iter().zip(&tags) {
            assert_eq!(tag[..], Sha512::digest(msg)[..]);
        }
    }

    #[test]
    fn hash_burst_rejects_null_and_invalid_jobs() {
        let mut m = manager();
        let jobs = m.get_next_burst(3).unwrap();
        let rejected = m.submit_hash_burst(jobs, HashAlg::Null).unwrap_err();
        assert_eq!((rejected.error, rejected.index), (ErrorCode::HashAlg, 0));
        // no tag buffers
        let rejected = m.submit_hash_burst(rejected.jobs, HashAlg::Sha256).unwrap_err();
        assert_eq!((rejected.error, rejected.index), (ErrorCode::JobNullAuth, 0));
        assert_eq!(m.free_slots(), super::CAPACITY);
    }

    #[test]
    fn unchecked_single_algorithm_bursts() {
        let msg = [0x62u8; 70];
        let mut tags = [[0u8; 32]; 2];
        let mut out = [0u8; 70];
        let key = CipherKey::new([1; 32]);
        let nonce = [0u8; 12];
        let mut m = manager();
        let mut jobs = m.get_next_burst(2).unwrap();
        for (job, tag) in jobs.iter_mut().zip(tags.iter_mut()) {
            job.src = Some(&msg);
            job.hash_len = msg.len();
            job.auth_tag = Some(tag);
        }
        let mut done = m.submit_hash_burst_nocheck(jobs, HashAlg::Sha256);
        let mut jobs = m.get_next_burst(1).unwrap();
        jobs[0].cipher_key = Some(&key);
        jobs[0].iv = Some(&nonce);
        jobs[0].src = Some(&msg);
        jobs[0].cipher_len = msg.len();
        jobs[0].dst = Some(&mut out);
        done.extend(m.submit_cipher_burst_nocheck(
            jobs,
            CipherMode::Chacha20,
            CipherDirection::Encrypt,
            32,
        ));
        done.extend(m.flush_burst(usize::MAX));
        assert_eq!(done.len(), 3);
        assert!(done.iter().all(|j| j.status() == Status::Completed));
        drop(done);
        drop(m);
        let want = sha2::Sha256::digest(msg);
        assert!(tags.iter().all(|t| t[..] == want[..]));
        let mut ks = msg;
        chacha20::ChaCha20::new(&[1; 32], &nonce).apply_keystream(&mut ks);
        assert_eq!(out, ks);
    }
}
