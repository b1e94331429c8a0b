use super::{Engine, Lane, LaneSet, MAX_LANES};
use crate::job::{Job, Status};
use chacha20::{init_state, lanes::LanesFn, Block, Nonce, BLOCK_SIZE, MAX_MESSAGE_LEN};
use crypto_common::erase::Erase;
use std::fmt::{Debug, Formatter};

/// Keystream blocks generated per lane per kernel call.
const CHUNK: usize = 4;

struct CipherLane<'a> {
    job: Job<'a>,
    state: [u32; 16],
    pos: usize,
    len: usize,
    fault: Option<Status>,
}

impl<'a> CipherLane<'a> {
    fn new(mut job: Job<'a>) -> Self {
        if job.status() == Status::Pending {
            job.set_status(Status::InBatch);
        }
        let len = job.cipher_len;
        let state = job
            .cipher_key
            .zip(job.iv.and_then(|iv| <&Nonce>::try_from(iv).ok()))
            .map(|(key, nonce)| init_state(key.as_bytes(), nonce, 0));
        let in_bounds = job
            .src
            .zip(job.cipher_offset.checked_add(len))
            .is_some_and(|(src, end)| end <= src.len())
            && job.dst.as_deref().is_some_and(|dst| dst.len() >= len);
        let fault = match state {
            _ if len as u64 > MAX_MESSAGE_LEN => Some(Status::Error),
            Some(_) if in_bounds => None,
            _ => Some(Status::InternalError),
        };
        Self {
            job,
            state: state.unwrap_or_default(),
            pos: 0,
            len,
            fault,
        }
    }

    fn is_done(&self) -> bool {
        self.fault.is_some() || self.pos == self.len
    }

    fn blocks_left(&self) -> usize {
        (self.len - self.pos).div_ceil(BLOCK_SIZE)
    }

    /// XORs up to `ks.len()` blocks of keystream into `dst`.
    fn apply(&mut self, ks: &[Block]) {
        let take = (self.len - self.pos).min(ks.len() * BLOCK_SIZE);
        let from = self.job.cipher_offset + self.pos;
        let src = self.job.src.and_then(|src| src.get(from..from + take));
        let dst = self
            .job
            .dst
            .as_deref_mut()
            .and_then(|dst| dst.get_mut(self.pos..self.pos + take));
        match (src, dst) {
            (Some(src), Some(dst)) => {
                for ((d, s), k) in dst.iter_mut().zip(src).zip(ks.iter().flatten()) {
                    *d = s ^ k;
                }
                self.pos += take;
            }
            _ => self.fault = Some(Status::InternalError),
        }
    }

    fn finish(mut self) -> Job<'a> {
        if let Some(status) = self.fault {
            self.job.set_status(status);
        }
        self.state.erase();
        self.job
    }
}

impl<'a> Lane<'a> for CipherLane<'a> {
    fn job(&self) -> &Job<'a> {
        &self.job
    }
}

/// ChaCha20 engine. Encryption and decryption are the same operation, so
/// direction never reaches the lanes.
pub struct CipherLanes<'a> {
    lanes: LaneSet<CipherLane<'a>>,
    kernel: LanesFn,
}

impl<'a> CipherLanes<'a> {
    pub fn new(width: usize, kernel: LanesFn) -> Self {
        Self {
            lanes: LaneSet::new(width),
            kernel,
        }
    }

    fn run(&mut self, done: &mut Vec<Job<'a>>) {
        loop {
            let evicted = self
                .lanes
                .evict(CipherLane::is_done, |lane| done.push(lane.finish()));
            if evicted > 0 {
                return;
            }
            let Some(step) = self.lanes.iter().map(|(_, l)| l.blocks_left()).min() else {
                return;
            };
            let width = self.lanes.width();
            let mut ks = [[[0u8; BLOCK_SIZE]; CHUNK]; MAX_LANES];
            let mut left = step;
            while left > 0 {
                let n = left.min(CHUNK);
                let mut states = [[0u32; 16]; MAX_LANES];
                for (i, lane) in self.lanes.iter() {
                    states[i] = lane.state;
                }
                {
                    let mut out: [&mut [Block]; MAX_LANES] = ks.each_mut().map(|k| &mut k[..n]);
                    (self.kernel)(&mut states[..width], &mut out[..width], n);
                }
                for (i, lane) in self.lanes.iter_mut() {
                    lane.state = states[i];
                    lane.apply(&ks[i][..n]);
                }
                states.erase();
                left -= n;
            }
            ks.erase();
        }
    }
}

impl<'a> Engine<'a> for CipherLanes<'a> {
    fn submit(&mut self, job: Job<'a>, done: &mut Vec<Job<'a>>) {
        self.lanes.insert(CipherLane::new(job));
        if self.lanes.is_full() {
            self.run(done);
        }
    }

    fn flush(&mut self, done: &mut Vec<Job<'a>>) {
        self.run(done);
    }

    fn occupied(&self) -> usize {
        self.lanes.occupied()
    }

    fn width(&self) -> usize {
        self.lanes.width()
    }

    fn holds(&self, slot: usize) -> bool {
        self.lanes.holds(slot)
    }
}

impl Debug for CipherLanes<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherLanes")
            .field("width", &self.lanes.width())
            .field("occupied", &self.lanes.occupied())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::CipherLanes;
    use crate::{
        job::{CipherKey, CipherMode, Job, Status},
        ooo::Engine,
    };
    use chacha20::ChaCha20;

    fn lanes<'a>(width: usize) -> CipherLanes<'a> {
        CipherLanes::new(width, chacha20::lanes::lanes_fn(width).unwrap())
    }

    fn cipher_job<'a>(
        slot: usize,
        key: &'a CipherKey,
        iv: &'a [u8],
        src: &'a [u8],
        dst: &'a mut [u8],
    ) -> Job<'a> {
        let mut job = Job::new(slot);
        job.cipher_mode = CipherMode::Chacha20;
        job.cipher_key = Some(key);
        job.iv = Some(iv);
        job.src = Some(src);
        job.cipher_len = src.len();
        job.dst = Some(dst);
        job
    }

    #[test]
    fn matches_streaming_cipher() {
        let key = CipherKey::new([7; 32]);
        let ivs: [[u8; 12]; 4] = core::array::from_fn(|i| [u8::try_from(i).unwrap(); 12]);
        let lens = [1, 64, 300, 1000];
        let src = [0x42u8; 1000];
        let mut dsts = [[0u8; 1000]; 4];
        let mut engine = lanes(4);
        let mut done = Vec::new();
        for (i, dst) in dsts.iter_mut().enumerate() {
            let job = cipher_job(i, &key, &ivs[i], &src[..lens[i]], &mut dst[..lens[i]]);
            engine.submit(job, &mut done);
        }
        while engine.occupied() > 0 {
            engine.flush(&mut done);
        }
        assert_eq!(done.len(), 4);
        assert!(done.iter().all(|j| j.status() == Status::InBatch));
        drop(done);
        for (i, dst) in dsts.iter().enumerate() {
            let mut want = src[..lens[i]].to_vec();
            ChaCha20::new(&[7; 32], &ivs[i]).apply_keystream(&mut want);
            assert_eq!(&dst[..lens[i]], &want[..], "lane {i}");
        }
    }

    #[test]
    fn short_job_finishes_first() {
        let key = CipherKey::new([1; 32]);
        let iv = [0u8; 12];
        let long = [0u8; 640];
        let short = [0u8; 10];
        let mut a = [0u8; 640];
        let mut b = [0u8; 10];
        let mut engine = lanes(2);
        let mut done = Vec::new();
        engine.submit(cipher_job(0, &key, &iv, &long, &mut a), &mut done);
        engine.submit(cipher_job(1, &key, &iv, &short, &mut b), &mut done);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].slot(), 1);
        assert!(engine.holds(0));
        assert!(!engine.holds(1));
    }

    #[test]
    fn bad_iv_is_internal_error() {
        let key = CipherKey::new([1; 32]);
        let iv = [0u8; 8];
        let src = [0u8; 16];
        let mut dst = [0u8; 16];
        let mut engine = lanes(1);
        let mut done = Vec::new();
        engine.submit(cipher_job(0, &key, &iv, &src, &mut dst), &mut done);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].status(), Status::InternalError);
    }
}
