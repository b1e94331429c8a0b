//! Out-of-order engines: one fixed-width set of lanes per algorithm family.
//!
//! An engine buffers jobs until every lane is occupied and then runs rounds
//! until at least one lane has finished. A flush does the same for a
//! partial set, padding idle lanes with throwaway work. Jobs leave in the
//! order their lanes finish, not the order they arrived.

mod cipher;
mod hash;

use crate::{
    arch::{Kernels, Lanes},
    job::{Family, Job},
};
pub use cipher::CipherLanes;
pub use hash::HashLanes;

/// Upper bound on any engine's width.
pub const MAX_LANES: usize = 16;

pub trait Engine<'a> {
    /// Places `job` in a free lane. Finished jobs, if any, are appended to
    /// `done`; an empty `done` just means the set isn't full yet.
    fn submit(&mut self, job: Job<'a>, done: &mut Vec<Job<'a>>);

    /// Runs rounds on whatever is occupied until one lane finishes. Does
    /// nothing when the engine is empty.
    fn flush(&mut self, done: &mut Vec<Job<'a>>);

    fn occupied(&self) -> usize;

    fn width(&self) -> usize;

    /// Whether the job from `slot` currently sits in one of the lanes.
    fn holds(&self, slot: usize) -> bool;
}

/// A job in a lane, plus whatever working state the engine keeps for it.
pub trait Lane<'a> {
    fn job(&self) -> &Job<'a>;
}

/// Fixed set of lanes. Slot positions are stable while a job is in flight,
/// so a lane's index is also its position in the kernel's arrays.
#[derive(Debug)]
pub struct LaneSet<L> {
    lanes: Vec<Option<L>>,
    occupied: usize,
}

impl<'a, L: Lane<'a>> LaneSet<L> {
    pub fn new(width: usize) -> Self {
        debug_assert!((1..=MAX_LANES).contains(&width));
        Self {
            lanes: std::iter::repeat_with(|| None).take(width).collect(),
            occupied: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.lanes.len()
    }

    pub const fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn is_full(&self) -> bool {
        self.occupied == self.lanes.len()
    }

    /// Puts `lane` into the lowest free index. The caller makes room first.
    pub fn insert(&mut self, lane: L) {
        debug_assert!(!self.is_full(), "no free lane");
        if let Some(free) = self.lanes.iter_mut().find(|l| l.is_none()) {
            *free = Some(lane);
            self.occupied += 1;
        }
    }

    pub fn take(&mut self, index: usize) -> Option<L> {
        let lane = self.lanes.get_mut(index)?.take()?;
        self.occupied -= 1;
        Some(lane)
    }

    /// Removes every lane matching `pred`, returning how many left.
    pub fn evict(&mut self, mut pred: impl FnMut(&L) -> bool, mut out: impl FnMut(L)) -> usize {
        let mut n = 0;
        for index in 0..self.lanes.len() {
            if self.lanes[index].as_ref().is_some_and(&mut pred) {
                if let Some(lane) = self.take(index) {
                    out(lane);
                    n += 1;
                }
            }
        }
        n
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &L)> {
        self.lanes
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.as_ref().map(|l| (i, l)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut L)> {
        self.lanes
            .iter_mut()
            .enumerate()
            .filter_map(|(i, l)| l.as_mut().map(|l| (i, l)))
    }

    pub fn holds(&self, slot: usize) -> bool {
        self.iter().any(|(_, l)| l.job().slot() == slot)
    }
}

/// One engine per family, looked up by [`Family`] with an exhaustive match.
#[derive(Debug)]
pub struct Engines<'a> {
    sha256: HashLanes<'a, u32, { sha256::BLOCK_LEN }>,
    sha512: HashLanes<'a, u64, { sha512::BLOCK_LEN }>,
    chacha20: CipherLanes<'a>,
}

impl<'a> Engines<'a> {
    pub fn new(lanes: Lanes, kernels: Kernels) -> Self {
        Self {
            sha256: HashLanes::new(lanes.sha256, kernels.sha256),
            sha512: HashLanes::new(lanes.sha512, kernels.sha512),
            chacha20: CipherLanes::new(lanes.chacha20, kernels.chacha20),
        }
    }

    pub fn get(&self, family: Family) -> &dyn Engine<'a> {
        match family {
            Family::Sha256 => &self.sha256,
            Family::Sha512 => &self.sha512,
            Family::Chacha20 => &self.chacha20,
        }
    }

    pub fn get_mut(&mut self, family: Family) -> &mut dyn Engine<'a> {
        match family {
            Family::Sha256 => &mut self.sha256,
            Family::Sha512 => &mut self.sha512,
            Family::Chacha20 => &mut self.chacha20,
        }
    }

    /// Engine whose lanes hold the job from `slot`.
    pub fn holding(&self, slot: usize) -> Option<Family> {
        Family::ALL.into_iter().find(|f| self.get(*f).holds(slot))
    }

    /// Engine with the most occupied lanes, if any lane is occupied.
    pub fn busiest(&self) -> Option<Family> {
        Family::ALL
            .into_iter()
            .filter(|f| self.get(*f).occupied() > 0)
            .max_by_key(|f| self.get(*f).occupied())
    }
}
