use super::{Engine, Lane, LaneSet, MAX_LANES};
use crate::job::{Chaining, HashAlg, Job, Status};
use crypto_common::{
    blocks::{split_blocks, Block, Tail},
    erase::Erase,
};
use std::fmt::{Debug, Formatter};

/// Word type of a SHA-2 family: `u32` for SHA-224/256, `u64` for SHA-384/512.
pub trait Word: Copy + Default + Erase {
    fn iv(alg: HashAlg) -> Option<[Self; 8]>;

    fn chaining(c: &Chaining) -> Option<[Self; 8]>;

    /// Writes the state big-endian into `out`, returning the bytes written.
    fn write_be(state: &[Self; 8], out: &mut [u8; 64]) -> usize;
}

impl Word for u32 {
    fn iv(alg: HashAlg) -> Option<[Self; 8]> {
        match alg {
            HashAlg::Sha224 => Some(sha256::consts::H224),
            HashAlg::Sha256 => Some(sha256::consts::H256),
            _ => None,
        }
    }

    fn chaining(c: &Chaining) -> Option<[Self; 8]> {
        match c {
            Chaining::Sha256(s) => Some(*s),
            Chaining::Sha512(_) => None,
        }
    }

    fn write_be(state: &[Self; 8], out: &mut [u8; 64]) -> usize {
        for (chunk, v) in out.chunks_exact_mut(4).zip(state) {
            chunk.copy_from_slice(&v.to_be_bytes());
        }
        32
    }
}

impl Word for u64 {
    fn iv(alg: HashAlg) -> Option<[Self; 8]> {
        match alg {
            HashAlg::Sha384 => Some(sha512::consts::H384),
            HashAlg::Sha512 => Some(sha512::consts::H512),
            _ => None,
        }
    }

    fn chaining(c: &Chaining) -> Option<[Self; 8]> {
        match c {
            Chaining::Sha512(s) => Some(*s),
            Chaining::Sha256(_) => None,
        }
    }

    fn write_be(state: &[Self; 8], out: &mut [u8; 64]) -> usize {
        for (chunk, v) in out.chunks_exact_mut(8).zip(state) {
            chunk.copy_from_slice(&v.to_be_bytes());
        }
        64
    }
}

pub type Kernel<W, const N: usize> = fn(&mut [[W; 8]], &[&[Block<N>]], usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Inner,
    /// Second pass of an HMAC over the inner digest.
    Outer,
    /// Parameters the lane can't work with; evicted on the next round.
    Broken,
}

/// One message in flight. `blocks` counts the whole blocks of the job's
/// hash input, which is re-borrowed from the job each round; `tail` holds
/// the padded remainder.
struct HashLane<'a, W, const N: usize> {
    job: Job<'a>,
    state: [W; 8],
    pos: usize,
    blocks: usize,
    tail: Tail<N>,
    phase: Phase,
}

impl<'a, W: Word, const N: usize> HashLane<'a, W, N> {
    fn new(mut job: Job<'a>) -> Self {
        if job.status() == Status::Pending {
            job.set_status(Status::InBatch);
        }
        let alg = job.hash_alg;
        let (state, prefix) = if alg.is_hmac() {
            let state = job
                .auth_key
                .filter(|k| k.alg() == alg)
                .and_then(|k| W::chaining(k.ipad()));
            (state, N)
        } else {
            (W::iv(alg), 0)
        };
        let tag_ok = job
            .auth_tag
            .as_deref()
            .is_some_and(|t| !t.is_empty() && t.len() <= alg.digest_len());
        let setup = match (state, job.hash_input()) {
            (Some(state), Some(input)) if tag_ok => {
                let (blocks, rem) = split_blocks::<N>(input);
                Some((state, blocks.len(), Tail::new(rem, (prefix + input.len()) as u128)))
            }
            _ => None,
        };
        match setup {
            Some((state, blocks, tail)) => Self {
                job,
                state,
                pos: 0,
                blocks,
                tail,
                phase: Phase::Inner,
            },
            None => Self {
                job,
                state: [W::default(); 8],
                pos: 0,
                blocks: 0,
                tail: Tail::new(&[], 0),
                phase: Phase::Broken,
            },
        }
    }

    fn remaining(&self) -> usize {
        self.blocks + self.tail.len() - self.pos
    }

    /// Blocks left before the lane switches from caller data to its tail.
    fn segment(&self) -> usize {
        if self.pos < self.blocks {
            self.blocks - self.pos
        } else {
            self.remaining()
        }
    }

    fn is_done(&self) -> bool {
        self.phase == Phase::Broken || self.remaining() == 0
    }

    /// The next `n` blocks, which never cross the data/tail boundary.
    fn next_blocks(&self, n: usize) -> &[Block<N>] {
        if self.pos < self.blocks {
            self.job
                .hash_input()
                .and_then(|input| split_blocks::<N>(input).0.get(self.pos..self.pos + n))
                .unwrap_or_default()
        } else {
            let at = self.pos - self.blocks;
            self.tail.blocks().get(at..at + n).unwrap_or_default()
        }
    }

    /// Called once the inner pass has consumed everything.
    fn advance_phase(&mut self) {
        if self.phase != Phase::Inner || !self.job.hash_alg.is_hmac() {
            return;
        }
        let opad = self
            .job
            .auth_key
            .and_then(|k| W::chaining(k.opad()));
        let Some(opad) = opad else {
            self.phase = Phase::Broken;
            return;
        };
        let mut digest = [0u8; 64];
        W::write_be(&self.state, &mut digest);
        let n = self.job.hash_alg.digest_len();
        self.tail = Tail::new(&digest[..n], (N + n) as u128);
        digest.erase();
        self.state = opad;
        self.blocks = 0;
        self.pos = 0;
        self.phase = Phase::Outer;
    }

    fn finish(mut self) -> Job<'a> {
        if self.phase == Phase::Broken {
            self.job.set_status(Status::InternalError);
        } else {
            let mut digest = [0u8; 64];
            W::write_be(&self.state, &mut digest);
            let n = self.job.hash_alg.digest_len();
            if let Some(tag) = self.job.auth_tag.as_deref_mut() {
                let n = tag.len().min(n);
                tag[..n].copy_from_slice(&digest[..n]);
            }
            digest.erase();
        }
        self.state.erase();
        self.tail.erase();
        self.job
    }
}

impl<'a, W, const N: usize> Lane<'a> for HashLane<'a, W, N> {
    fn job(&self) -> &Job<'a> {
        &self.job
    }
}

/// SHA-2 engine for one word size. HMAC jobs run their inner and outer
/// passes in the same lane.
pub struct HashLanes<'a, W, const N: usize> {
    lanes: LaneSet<HashLane<'a, W, N>>,
    kernel: Kernel<W, N>,
}

impl<'a, W: Word, const N: usize> HashLanes<'a, W, N> {
    pub fn new(width: usize, kernel: Kernel<W, N>) -> Self {
        Self {
            lanes: LaneSet::new(width),
            kernel,
        }
    }

    /// Runs until at least one lane has finished, then evicts every lane
    /// that has.
    fn run(&mut self, done: &mut Vec<Job<'a>>) {
        loop {
            let evicted = self
                .lanes
                .evict(HashLane::is_done, |lane| done.push(lane.finish()));
            if evicted > 0 {
                return;
            }
            let Some(step) = self.lanes.iter().map(|(_, l)| l.segment()).min() else {
                return;
            };
            let width = self.lanes.width();
            let mut states = [[W::default(); 8]; MAX_LANES];
            let mut msgs: [&[Block<N>]; MAX_LANES] = [&[]; MAX_LANES];
            for (i, lane) in self.lanes.iter() {
                states[i] = lane.state;
                msgs[i] = lane.next_blocks(step);
            }
            (self.kernel)(&mut states[..width], &msgs[..width], step);
            for (i, lane) in self.lanes.iter_mut() {
                lane.state = states[i];
                lane.pos += step;
                if lane.remaining() == 0 {
                    lane.advance_phase();
                }
            }
            states.erase();
        }
    }
}

impl<'a, W: Word, const N: usize> Engine<'a> for HashLanes<'a, W, N> {
    fn submit(&mut self, job: Job<'a>, done: &mut Vec<Job<'a>>) {
        self.lanes.insert(HashLane::new(job));
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

impl<W, const N: usize> Debug for HashLanes<'_, W, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashLanes")
            .field("width", &self.lanes.width())
            .field("occupied", &self.lanes.occupied())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::HashLanes;
    use crate::{
        job::{AuthKey, HashAlg, Job, Status},
        ooo::Engine,
    };

    fn sha256_lanes<'a>(width: usize) -> HashLanes<'a, u32, 64> {
        HashLanes::new(width, sha256::lanes::lanes_fn(width).unwrap())
    }

    fn sha512_lanes<'a>(width: usize) -> HashLanes<'a, u64, 128> {
        HashLanes::new(width, sha512::lanes::lanes_fn(width).unwrap())
    }

    fn hash_job<'a>(slot: usize, alg: HashAlg, src: &'a [u8], tag: &'a mut [u8]) -> Job<'a> {
        let mut job = Job::new(slot);
        job.hash_alg = alg;
        job.src = Some(src);
        job.hash_len = src.len();
        job.auth_tag = Some(tag);
        job
    }

    #[test]
    fn waits_until_full() {
        let mut lanes = sha256_lanes(4);
        let mut done = Vec::new();
        let msgs: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 30 + 70 * usize::from(i)]).collect();
        let mut tags = [[0u8; 32]; 4];
        let mut tags = tags.iter_mut();
        for (i, m) in msgs.iter().take(3).enumerate() {
            let tag = tags.next().unwrap();
            lanes.submit(hash_job(i, HashAlg::Sha256, m, tag), &mut done);
            assert!(done.is_empty());
        }
        assert_eq!(lanes.occupied(), 3);
        lanes.submit(hash_job(3, HashAlg::Sha256, &msgs[3], tags.next().unwrap()), &mut done);
        // slot 0 has the shortest message
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].slot(), 0);
        while lanes.occupied() > 0 {
            lanes.flush(&mut done);
        }
        assert_eq!(done.len(), 4);
        for job in &done {
            let i = job.slot();
            assert_eq!(job.status(), Status::InBatch);
            let tag = job.auth_tag.as_deref().unwrap();
            assert_eq!(tag, sha256::Sha256::digest(&msgs[i]));
        }
    }

    #[test]
    fn flush_on_empty_is_a_no_op() {
        let mut lanes = sha512_lanes(2);
        let mut done = Vec::new();
        lanes.flush(&mut done);
        assert!(done.is_empty());
        assert_eq!(lanes.width(), 2);
    }

    #[test]
    fn hmac_runs_both_passes() {
        let key = AuthKey::new(HashAlg::HmacSha384, &[0x0b; 20]).unwrap();
        let mut tag = [0u8; 48];
        let mut lanes = sha512_lanes(1);
        let mut done = Vec::new();
        let mut job = hash_job(0, HashAlg::HmacSha384, b"Hi There", &mut tag);
        job.auth_key = Some(&key);
        lanes.submit(job, &mut done);
        assert_eq!(done.len(), 1);
        drop(done);
        assert_eq!(
            hex::encode(tag),
            "afd03944d84895626b0825f4ab46907f15f9dadbe4101ec682aa034c7cebc59c\
             faea9ea9076ede7f4af152e8b2fa9cb6"
        );
    }

    #[test]
    fn broken_lane_does_not_stall_siblings() {
        let msg = [0x61u8; 200];
        let mut good = [0u8; 32];
        let mut bad = [0u8; 32];
        let mut lanes = sha256_lanes(2);
        let mut done = Vec::new();
        lanes.submit(hash_job(0, HashAlg::Sha256, &msg, &mut good), &mut done);
        // keyed, but no key
        lanes.submit(hash_job(1, HashAlg::HmacSha256, &msg, &mut bad), &mut done);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].slot(), 1);
        assert_eq!(done[0].status(), Status::InternalError);
        lanes.flush(&mut done);
        assert_eq!(done.len(), 2);
        assert_eq!(done[1].status(), Status::InBatch);
        drop(done);
        assert_eq!(good, sha256::Sha256::digest(&msg));
    }

    #[test]
    fn truncated_tag() {
        let mut tag = [0u8; 20];
        let mut lanes = sha256_lanes(1);
        let mut done = Vec::new();
        lanes.submit(hash_job(0, HashAlg::Sha224, b"abc", &mut tag), &mut done);
        drop(done);
        assert_eq!(hex::encode(tag), "23097d223405d8228642a477bda255b32aadbce4");
    }
}
