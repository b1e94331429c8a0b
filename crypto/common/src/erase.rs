//! Scrubbing of secret material.
//!
//! Writes go through [`core::ptr::write_volatile`] followed by a compiler
//! fence so the zeroing survives dead-store elimination even when the value
//! is about to be dropped.

#[inline(always)]
fn atomic_fence() {
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

#[inline(always)]
fn volatile_write<T: Copy + Sized>(src: T, dst: &mut T) {
    unsafe { core::ptr::write_volatile(dst, src) }
}

pub trait Erase {
    fn erase(&mut self);
}

trait DefaultIsErased: Copy + Default + Sized {}

impl<E: DefaultIsErased> Erase for E {
    fn erase(&mut self) {
        volatile_write(E::default(), self);
        atomic_fence();
    }
}

macro_rules! impl_default_is_erased {
    ($($t:ty),*) => {
        $(
            impl DefaultIsErased for $t {}
        )*
    };
}

#[rustfmt::skip]
impl_default_is_erased! {
    (), bool, char,
    i8, i16, i32, i64, i128, isize,
    u8, u16, u32, u64, u128, usize
}

impl<E: Erase, const N: usize> Erase for [E; N] {
    fn erase(&mut self) {
        self.iter_mut().erase();
    }
}

impl<E: Erase> Erase for [E] {
    fn erase(&mut self) {
        self.iter_mut().erase();
    }
}

impl<E: Erase> Erase for core::slice::IterMut<'_, E> {
    fn erase(&mut self) {
        for elem in self {
            elem.erase();
        }
    }
}

/// Zeroes `buf` in a way the optimizer won't remove.
///
/// Meant for key material and intermediate digests held in caller-owned
/// memory once a job has been retired.
#[inline]
pub fn clear_mem(buf: &mut [u8]) {
    buf.erase();
}
