//! The job manager: a fixed ring of job slots in front of one out-of-order
//! engine per algorithm family.
//!
//! A slot is owned from the moment its job is accepted until the job is
//! handed back. Accepted jobs are dispatched straight into an engine; the
//! manager only buffers what has finished but cannot be returned yet.

mod burst;

use crate::{
    arch::{self, Arch, Features, Kernels, Lanes, WIDTHS},
    error::{ErrorCode, Rejected},
    job::{Family, Job, Status},
    ooo::Engines,
    selftest, validate,
};
use log::{debug, trace};
use std::collections::VecDeque;

pub use crate::ooo::MAX_LANES;

/// Number of job slots in a manager.
pub const CAPACITY: usize = 2 * MAX_LANES;

/// Most jobs a single burst call accepts.
pub const MAX_BURST_SIZE: usize = 32;

/// Order in which finished jobs are handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Retire {
    /// Submission order. A job that finishes early waits for every job
    /// submitted before it.
    #[default]
    InOrder,
    /// Whatever the engines finish first.
    Completion,
}

impl Retire {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InOrder => "in-order",
            Self::Completion => "completion",
        }
    }
}

impl std::str::FromStr for Retire {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::InOrder, Self::Completion]
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// Construction options for a [`Manager`].
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct Builder {
    arch: Option<Arch>,
    width: Option<usize>,
    retire: Retire,
    self_test: bool,
}

impl Builder {
    /// Forces an architecture instead of the best one the CPU supports.
    pub const fn arch(mut self, arch: Arch) -> Self {
        self.arch = Some(arch);
        self
    }

    /// Uses `width` lanes for every engine. Must be one of
    /// [`WIDTHS`](crate::arch::WIDTHS).
    pub const fn width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub const fn retire(mut self, retire: Retire) -> Self {
        self.retire = retire;
        self
    }

    /// Runs the known-answer tests before handing the manager out.
    pub const fn self_test(mut self, yes: bool) -> Self {
        self.self_test = yes;
        self
    }

    pub fn build<'a>(self) -> Result<Manager<'a>, ErrorCode> {
        let features = arch::features();
        let arch = match self.arch {
            Some(arch) if !arch.supported_by(features) => {
                debug!("{arch} requested, but the CPU only has: {features}");
                return Err(ErrorCode::MissingCpuFlags);
            }
            Some(arch) => arch,
            None => Arch::best_for(features),
        };
        let lanes = match self.width {
            Some(width) if WIDTHS.contains(&width) => Lanes::uniform(width),
            Some(width) => {
                debug!("no kernel for {width} lanes");
                return Err(ErrorCode::InvalidWidth);
            }
            None => arch.lanes(),
        };
        let mut manager = Manager::assemble(arch, lanes, self.retire, features)?;
        debug!(
            "manager ready: arch {arch}, lanes {}/{}/{}, retire {}",
            lanes.sha256,
            lanes.sha512,
            lanes.chacha20,
            self.retire.name()
        );
        if self.self_test {
            selftest::run(&mut manager)?;
        }
        Ok(manager)
    }
}

/// Schedules jobs over the lane engines.
///
/// Every method takes `&mut self`; run one manager per thread to scale out.
/// Buffers referenced by a job stay borrowed for `'a`, which covers the
/// whole time the job is inside the manager.
pub struct Manager<'a> {
    arch: Arch,
    pub(crate) features: Features,
    lanes: Lanes,
    retire: Retire,
    engines: Engines<'a>,
    /// Slot owned by an accepted, unreturned job.
    busy: [bool; CAPACITY],
    /// Where the next free-slot scan starts.
    next: usize,
    /// Accepted slots, earliest first.
    order: VecDeque<usize>,
    /// Finished jobs not yet handed back, indexed by slot.
    done: [Option<Job<'a>>; CAPACITY],
    /// Finished slots in the order they finished. Only kept for
    /// [`Retire::Completion`].
    ready: VecDeque<usize>,
    last_error: Option<ErrorCode>,
}

impl<'a> Manager<'a> {
    /// A manager for the best architecture the CPU supports.
    pub fn new() -> Result<Self, ErrorCode> {
        Builder::default().build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    pub(crate) fn assemble(
        arch: Arch,
        lanes: Lanes,
        retire: Retire,
        features: Features,
    ) -> Result<Self, ErrorCode> {
        let kernels = Kernels::for_lanes(lanes)?;
        Ok(Self {
            arch,
            features,
            lanes,
            retire,
            engines: Engines::new(lanes, kernels),
            busy: [false; CAPACITY],
            next: 0,
            order: VecDeque::with_capacity(CAPACITY),
            done: std::array::from_fn(|_| None),
            ready: VecDeque::with_capacity(CAPACITY),
            last_error: None,
        })
    }

    #[must_use]
    pub const fn arch(&self) -> Arch {
        self.arch
    }

    #[must_use]
    pub const fn features(&self) -> Features {
        self.features
    }

    #[must_use]
    pub const fn lanes(&self, family: Family) -> usize {
        self.lanes.get(family)
    }

    #[must_use]
    pub const fn layout(&self) -> Lanes {
        self.lanes
    }

    #[must_use]
    pub const fn retire_policy(&self) -> Retire {
        self.retire
    }

    /// Error from the most recent failed call. Never cleared by a
    /// successful one.
    #[must_use]
    pub const fn last_error(&self) -> Option<ErrorCode> {
        self.last_error
    }

    pub(crate) fn fail(&mut self, error: ErrorCode) -> ErrorCode {
        self.last_error = Some(error);
        error
    }

    /// Jobs accepted and not yet handed back.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn free_slots(&self) -> usize {
        CAPACITY - self.order.len()
    }

    fn free_from_cursor(&self) -> impl Iterator<Item = usize> + '_ {
        (0..CAPACITY)
            .map(|i| (self.next + i) % CAPACITY)
            .filter(|&slot| !self.busy[slot])
    }

    /// A blank job bound to the next free slot. Nothing is reserved: asking
    /// again before submitting returns the same slot.
    pub fn get_next_job(&mut self) -> Result<Job<'a>, ErrorCode> {
        let free = self.free_from_cursor().next();
        match free {
            Some(slot) => Ok(Job::new(slot)),
            None => Err(self.fail(ErrorCode::QueueSpace)),
        }
    }

    /// Validates and accepts `job`, returning a finished job if one is
    /// ready to be handed back. A rejected job is returned untouched and
    /// nothing is enqueued.
    pub fn submit_job(&mut self, job: Job<'a>) -> Result<Option<Job<'a>>, Rejected<'a>> {
        let check = if self.busy[job.slot()] {
            Err(ErrorCode::SlotInUse)
        } else {
            validate::job(&job)
        };
        match check {
            Ok(()) => Ok(self.accept(job)),
            Err(error) => {
                debug!("rejected job in slot {}: {error}", job.slot());
                Err(Rejected {
                    error: self.fail(error),
                    job,
                })
            }
        }
    }

    /// Accepts `job` without validating it.
    ///
    /// Only for trusted callers. Parameters a lane can't work with come
    /// back as [`Status::InternalError`] rather than a rejection, and a job
    /// for a slot that is still owned comes straight back as
    /// [`Status::InvalidArgs`].
    pub fn submit_job_nocheck(&mut self, mut job: Job<'a>) -> Option<Job<'a>> {
        if self.busy[job.slot()] {
            self.fail(ErrorCode::SlotInUse);
            job.rearm();
            job.set_status(Status::InvalidArgs);
            return Some(job);
        }
        self.accept(job)
    }

    fn accept(&mut self, mut job: Job<'a>) -> Option<Job<'a>> {
        job.rearm();
        let slot = job.slot();
        self.busy[slot] = true;
        self.order.push_back(slot);
        self.next = (slot + 1) % CAPACITY;
        self.dispatch(job);
        self.retire()
    }

    /// Hands back a finished job without doing any work.
    pub fn get_completed_job(&mut self) -> Option<Job<'a>> {
        self.retire()
    }

    /// Forces engines to run partial batches until a job can be handed
    /// back. `None` only when nothing is outstanding.
    pub fn flush_job(&mut self) -> Option<Job<'a>> {
        loop {
            if let Some(job) = self.retire() {
                return Some(job);
            }
            let &earliest = self.order.front()?;
            let family = match self.retire {
                Retire::InOrder => self.engines.holding(earliest),
                Retire::Completion => self.engines.busiest(),
            };
            debug_assert!(family.is_some(), "slot {earliest} is neither finished nor in a lane");
            let family = family?;
            let engine = self.engines.get_mut(family);
            trace!("flushing {family:?}, {} of {} lanes", engine.occupied(), engine.width());
            let mut out = Vec::new();
            engine.flush(&mut out);
            self.route(family, out);
        }
    }

    /// Moves `job` through as many engines as it takes to either finish it
    /// or park it in a lane.
    fn dispatch(&mut self, job: Job<'a>) {
        let mut pending = vec![job];
        while let Some(mut job) = pending.pop() {
            let Some(family) = job.next_stage() else {
                if !job.status().is_terminal() {
                    job.set_status(Status::Completed);
                }
                self.finish(job);
                continue;
            };
            let mut out = Vec::new();
            self.engines.get_mut(family).submit(job, &mut out);
            for job in out {
                if let Some(job) = self.stage_done(family, job) {
                    pending.push(job);
                }
            }
        }
    }

    /// Handles jobs evicted by a flush of `family`.
    fn route(&mut self, family: Family, out: Vec<Job<'a>>) {
        for job in out {
            if let Some(job) = self.stage_done(family, job) {
                self.dispatch(job);
            }
        }
    }

    /// Records that `family` is done with `job`. Returns the job if another
    /// stage is still outstanding.
    fn stage_done(&mut self, family: Family, mut job: Job<'a>) -> Option<Job<'a>> {
        if job.status().is_error() {
            trace!("slot {} failed in {family:?}: {:?}", job.slot(), job.status());
            self.finish(job);
            return None;
        }
        let status = job.stage_done(family);
        job.set_status(status);
        if status == Status::Completed {
            self.finish(job);
            None
        } else {
            Some(job)
        }
    }

    fn finish(&mut self, job: Job<'a>) {
        let slot = job.slot();
        if self.retire == Retire::Completion {
            self.ready.push_back(slot);
        }
        self.done[slot] = Some(job);
    }

    fn retire(&mut self) -> Option<Job<'a>> {
        let slot = match self.retire {
            Retire::InOrder => {
                let &front = self.order.front()?;
                self.done[front].as_ref()?;
                self.order.pop_front();
                front
            }
            Retire::Completion => {
                let slot = self.ready.pop_front()?;
                if let Some(i) = self.order.iter().position(|&s| s == slot) {
                    self.order.remove(i);
                }
                slot
            }
        };
        self.busy[slot] = false;
        self.done[slot].take()
    }
}

impl std::fmt::Debug for Manager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("arch", &self.arch)
            .field("features", &self.features)
            .field("lanes", &self.lanes)
            .field("retire", &self.retire)
            .field("queue_size", &self.order.len())
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Builder, Manager, Retire, CAPACITY};
    use crate::{
        arch::Arch,
        error::ErrorCode,
        job::{Family, HashAlg, Status},
    };

    fn manager<'a>(width: usize, retire: Retire) -> Manager<'a> {
        Builder::default()
            .arch(Arch::NoAesni)
            .width(width)
            .retire(retire)
            .build()
            .unwrap()
    }

    #[test]
    fn next_job_is_not_reserved() {
        let mut m = manager(4, Retire::InOrder);
        let a = m.get_next_job().unwrap();
        let b = m.get_next_job().unwrap();
        assert_eq!(a.slot(), b.slot());
        assert!(m.submit_job(a).unwrap().is_some());
        assert_ne!(m.get_next_job().unwrap().slot(), b.slot());
    }

    #[test]
    fn null_job_completes_immediately() {
        let mut m = manager(4, Retire::InOrder);
        let mut job = m.get_next_job().unwrap();
        job.user_data = 7;
        let job = m.submit_job(job).unwrap().unwrap();
        assert_eq!(job.status(), Status::Completed);
        assert_eq!(job.user_data, 7);
        assert_eq!(m.queue_size(), 0);
        assert_eq!(m.free_slots(), CAPACITY);
    }

    #[test]
    fn reused_slot_is_rejected() {
        let src = [0u8; 8];
        let mut tags = [[0u8; 32]; 2];
        let [t0, t1] = &mut tags;
        let mut m = manager(4, Retire::InOrder);
        let mut first = m.get_next_job().unwrap();
        let mut second = m.get_next_job().unwrap();
        for (job, tag) in [(&mut first, t0), (&mut second, t1)] {
            job.hash_alg = HashAlg::Sha256;
            job.src = Some(&src);
            job.hash_len = src.len();
            job.auth_tag = Some(tag);
        }
        assert!(m.submit_job(first).unwrap().is_none());
        let rejected = m.submit_job(second).unwrap_err();
        assert_eq!(rejected.error, ErrorCode::SlotInUse);
        assert_eq!(m.last_error(), Some(ErrorCode::SlotInUse));
        let back = m.submit_job_nocheck(rejected.job).unwrap();
        assert_eq!(back.status(), Status::InvalidArgs);
        assert_eq!(m.queue_size(), 1);
        assert_eq!(m.flush_job().unwrap().status(), Status::Completed);
        assert!(m.flush_job().is_none());
    }

    #[test]
    fn width_and_arch_checks() {
        assert_eq!(
            Builder::default().width(3).build().err(),
            Some(ErrorCode::InvalidWidth)
        );
        let m = Manager::new().unwrap();
        assert_eq!(m.lanes(Family::Sha256), m.arch().lanes().sha256);
        let m = manager(2, Retire::Completion);
        assert_eq!(m.lanes(Family::Chacha20), 2);
    }

    #[test]
    fn retire_names() {
        assert_eq!("completion".parse(), Ok(Retire::Completion));
        assert_eq!("In-Order".parse(), Ok(Retire::InOrder));
        assert!("fifo".parse::<Retire>().is_err());
    }
}
