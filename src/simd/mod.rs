//! SIMD abstraction layer
//!
//! Kernels are written once against [`Backend`] and compiled per target. Every
//! backend implements the same reorder primitives with the same observable
//! result; only the register width (and so `Vector::LANES`) differs.
//!
//! | Backend  | Width    | Required      | Platform |
//! |----------|----------|---------------|----------|
//! | `Avx2`   | 256-bit  | AVX2          | x86_64   |
//! | `Sse2`   | 128-bit  | SSE SSE2      | x86_64   |
//! | `Neon`   | 128-bit  | NEON          | aarch64  |
//! | `Scalar` | 128-bit  | (none)        | any      |
//!
//! Primitive methods are `unsafe`: the caller guarantees the running CPU has
//! every capability in `Backend::REQUIRED`. Slice lengths are checked.

pub mod scalar;

#[cfg(target_arch = "x86_64")]
pub mod avx2;
#[cfg(target_arch = "x86_64")]
pub mod sse2;

#[cfg(target_arch = "aarch64")]
pub mod neon;

use std::fmt::Debug;

use crate::core::types::CapabilitySet;

pub use scalar::{Lanes, Scalar};

#[cfg(target_arch = "x86_64")]
pub use avx2::Avx2;
#[cfg(target_arch = "x86_64")]
pub use sse2::Sse2;

#[cfg(target_arch = "aarch64")]
pub use neon::Neon;

/// Widest vector in lanes (u8 on AVX2)
pub const MAX_LANES: usize = 32;

/// Element type of a vector register
pub trait Lane: Copy + Default + PartialEq + Debug + Send + Sync + 'static {}

macro_rules! impl_lane {
    ($($t:ty),*) => { $(impl Lane for $t {})* };
}

impl_lane!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Fixed-width vector register holding `LANES` elements of one lane type
pub trait Vector: Copy {
    type Lane: Lane;
    const LANES: usize;

    /// Load the first `LANES` elements of `src`
    ///
    /// # Safety
    /// The CPU must support the owning backend. Panics if `src` is too short.
    unsafe fn load(src: &[Self::Lane]) -> Self;

    /// Store into the first `LANES` elements of `dst`
    ///
    /// # Safety
    /// Same as `load`.
    unsafe fn store(self, dst: &mut [Self::Lane]);

    /// First half of `self` followed by first half of `b`
    ///
    /// # Safety
    /// The CPU must support the owning backend.
    unsafe fn combine_low(self, b: Self) -> Self;

    /// Second half of `self` followed by second half of `b`
    ///
    /// # Safety
    /// The CPU must support the owning backend.
    unsafe fn combine_high(self, b: Self) -> Self;

    /// Lanes of `self` and `b` alternated, starting from `self[0]`
    /// `.0` interleaves the lower halves, `.1` the upper halves
    ///
    /// # Safety
    /// The CPU must support the owning backend.
    unsafe fn interleave(self, b: Self) -> (Self, Self);

    /// Inverse of `interleave`: even lanes of `self ++ b`, then odd lanes
    ///
    /// # Safety
    /// The CPU must support the owning backend.
    unsafe fn deinterleave(self, b: Self) -> (Self, Self) {
        let n = Self::LANES;
        let mut joined = [Self::Lane::default(); 2 * MAX_LANES];
        let mut split = [Self::Lane::default(); 2 * MAX_LANES];
        unsafe {
            self.store(&mut joined[..n]);
            b.store(&mut joined[n..2 * n]);
        }
        for i in 0..n {
            split[i] = joined[2 * i];
            split[n + i] = joined[2 * i + 1];
        }
        unsafe { (Self::load(&split[..n]), Self::load(&split[n..2 * n])) }
    }
}

/// Static lane permutation, applied independently to every 128-bit block
/// Only 32-bit (4 lanes per block) and 64-bit (2 lanes per block) lanes shuffle
pub trait Shuffle: Vector {
    /// Lane `i` of each block becomes lane `P[i]` of the same block; build `P`
    /// with [`pattern4`] or [`pattern2`]
    ///
    /// # Safety
    /// The CPU must support the owning backend.
    unsafe fn shuffle<const P: i32>(self) -> Self {
        let n = Self::LANES;
        let mut src = [Self::Lane::default(); MAX_LANES];
        let mut dst = [Self::Lane::default(); MAX_LANES];
        unsafe { self.store(&mut src[..n]) };
        shuffle_blocks(&src[..n], &mut dst[..n], P);
        unsafe { Self::load(&dst[..n]) }
    }
}

/// Shuffle pattern for 4-lane blocks: output lane i takes input lane `li`
pub const fn pattern4(l0: u32, l1: u32, l2: u32, l3: u32) -> i32 {
    ((l0 & 3) | (l1 & 3) << 2 | (l2 & 3) << 4 | (l3 & 3) << 6) as i32
}

/// Shuffle pattern for 2-lane blocks
pub const fn pattern2(l0: u32, l1: u32) -> i32 {
    ((l0 & 1) | (l1 & 1) << 1) as i32
}

/// Reference permutation used by backends without a native shuffle
pub fn shuffle_blocks<T: Lane>(src: &[T], dst: &mut [T], pattern: i32) {
    let block = 16 / std::mem::size_of::<T>();
    let (bits, mask) = match block {
        4 => (2, 3),
        2 => (1, 1),
        _ => panic!("shuffle is defined for 32-bit and 64-bit lanes only"),
    };
    for (s, d) in src.chunks(block).zip(dst.chunks_mut(block)) {
        for (i, lane) in d.iter_mut().enumerate() {
            *lane = s[((pattern >> (bits * i)) & mask) as usize];
        }
    }
}

/// Maps a lane type to a backend's vector type for it
pub trait Register<T: Lane> {
    type Vector: Vector<Lane = T>;
}

/// `B`'s vector type for lane `T`
pub type VectorOf<B, T> = <B as Register<T>>::Vector;

/// One compilation target of the abstraction layer
pub trait Backend:
    Register<u8>
    + Register<i8>
    + Register<u16>
    + Register<i16>
    + Register<u32>
    + Register<i32>
    + Register<u64>
    + Register<i64>
    + Register<f32>
    + Register<f64>
    + Copy
    + 'static
{
    /// Variant name reported by dispatch
    const NAME: &'static str;
    /// Capabilities the CPU needs to run this backend
    const REQUIRED: CapabilitySet;
    /// Priority of this backend's variants in dispatch tables
    const PRIORITY: u32;
}
