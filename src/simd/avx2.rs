//! 256-bit x86_64 backend
//!
//! AVX2 unpack and shuffle instructions work within each 128-bit half, so
//! combine and interleave finish with a cross-half `permute2x128`
//! (0x20 selects both low halves, 0x31 both high halves).

use std::arch::x86_64::*;
use std::marker::PhantomData;

use super::{Backend, Register, Shuffle, Vector};
use crate::core::types::{Cap, CapabilitySet};

#[derive(Debug, Clone, Copy)]
pub struct Avx2;

#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct I256<T>(pub __m256i, PhantomData<T>);

impl<T> I256<T> {
    #[inline(always)]
    fn wrap(v: __m256i) -> Self {
        Self(v, PhantomData)
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct F32x8(pub __m256);

#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct F64x4(pub __m256d);

macro_rules! avx2_integer {
    ($t:ty, $lanes:expr, $unpacklo:ident, $unpackhi:ident) => {
        impl Vector for I256<$t> {
            type Lane = $t;
            const LANES: usize = $lanes;

            #[inline(always)]
            unsafe fn load(src: &[$t]) -> Self {
                assert!(src.len() >= $lanes, "load needs {} lanes, got {}", $lanes, src.len());
                Self::wrap(unsafe { _mm256_loadu_si256(src.as_ptr() as *const __m256i) })
            }

            #[inline(always)]
            unsafe fn store(self, dst: &mut [$t]) {
                assert!(dst.len() >= $lanes, "store needs {} lanes, got {}", $lanes, dst.len());
                unsafe { _mm256_storeu_si256(dst.as_mut_ptr() as *mut __m256i, self.0) }
            }

            #[inline(always)]
            unsafe fn combine_low(self, b: Self) -> Self {
                Self::wrap(unsafe { _mm256_permute2x128_si256::<0x20>(self.0, b.0) })
            }

            #[inline(always)]
            unsafe fn combine_high(self, b: Self) -> Self {
                Self::wrap(unsafe { _mm256_permute2x128_si256::<0x31>(self.0, b.0) })
            }

            #[inline(always)]
            unsafe fn interleave(self, b: Self) -> (Self, Self) {
                unsafe {
                    let lo = $unpacklo(self.0, b.0);
                    let hi = $unpackhi(self.0, b.0);
                    (
                        Self::wrap(_mm256_permute2x128_si256::<0x20>(lo, hi)),
                        Self::wrap(_mm256_permute2x128_si256::<0x31>(lo, hi)),
                    )
                }
            }
        }

        impl Register<$t> for Avx2 {
            type Vector = I256<$t>;
        }
    };
}

avx2_integer!(u8, 32, _mm256_unpacklo_epi8, _mm256_unpackhi_epi8);
avx2_integer!(i8, 32, _mm256_unpacklo_epi8, _mm256_unpackhi_epi8);
avx2_integer!(u16, 16, _mm256_unpacklo_epi16, _mm256_unpackhi_epi16);
avx2_integer!(i16, 16, _mm256_unpacklo_epi16, _mm256_unpackhi_epi16);
avx2_integer!(u32, 8, _mm256_unpacklo_epi32, _mm256_unpackhi_epi32);
avx2_integer!(i32, 8, _mm256_unpacklo_epi32, _mm256_unpackhi_epi32);
avx2_integer!(u64, 4, _mm256_unpacklo_epi64, _mm256_unpackhi_epi64);
avx2_integer!(i64, 4, _mm256_unpacklo_epi64, _mm256_unpackhi_epi64);

impl Vector for F32x8 {
    type Lane = f32;
    const LANES: usize = 8;

    #[inline(always)]
    unsafe fn load(src: &[f32]) -> Self {
        assert!(src.len() >= 8, "load needs 8 lanes, got {}", src.len());
        Self(unsafe { _mm256_loadu_ps(src.as_ptr()) })
    }

    #[inline(always)]
    unsafe fn store(self, dst: &mut [f32]) {
        assert!(dst.len() >= 8, "store needs 8 lanes, got {}", dst.len());
        unsafe { _mm256_storeu_ps(dst.as_mut_ptr(), self.0) }
    }

    #[inline(always)]
    unsafe fn combine_low(self, b: Self) -> Self {
        Self(unsafe { _mm256_permute2f128_ps::<0x20>(self.0, b.0) })
    }

    #[inline(always)]
    unsafe fn combine_high(self, b: Self) -> Self {
        Self(unsafe { _mm256_permute2f128_ps::<0x31>(self.0, b.0) })
    }

    #[inline(always)]
    unsafe fn interleave(self, b: Self) -> (Self, Self) {
        unsafe {
            let lo = _mm256_unpacklo_ps(self.0, b.0);
            let hi = _mm256_unpackhi_ps(self.0, b.0);
            (
                Self(_mm256_permute2f128_ps::<0x20>(lo, hi)),
                Self(_mm256_permute2f128_ps::<0x31>(lo, hi)),
            )
        }
    }
}

impl Vector for F64x4 {
    type Lane = f64;
    const LANES: usize = 4;

    #[inline(always)]
    unsafe fn load(src: &[f64]) -> Self {
        assert!(src.len() >= 4, "load needs 4 lanes, got {}", src.len());
        Self(unsafe { _mm256_loadu_pd(src.as_ptr()) })
    }

    #[inline(always)]
    unsafe fn store(self, dst: &mut [f64]) {
        assert!(dst.len() >= 4, "store needs 4 lanes, got {}", dst.len());
        unsafe { _mm256_storeu_pd(dst.as_mut_ptr(), self.0) }
    }

    #[inline(always)]
    unsafe fn combine_low(self, b: Self) -> Self {
        Self(unsafe { _mm256_permute2f128_pd::<0x20>(self.0, b.0) })
    }

    #[inline(always)]
    unsafe fn combine_high(self, b: Self) -> Self {
        Self(unsafe { _mm256_permute2f128_pd::<0x31>(self.0, b.0) })
    }

    #[inline(always)]
    unsafe fn interleave(self, b: Self) -> (Self, Self) {
        unsafe {
            let lo = _mm256_unpacklo_pd(self.0, b.0);
            let hi = _mm256_unpackhi_pd(self.0, b.0);
            (
                Self(_mm256_permute2f128_pd::<0x20>(lo, hi)),
                Self(_mm256_permute2f128_pd::<0x31>(lo, hi)),
            )
        }
    }
}

impl Register<f32> for Avx2 {
    type Vector = F32x8;
}

impl Register<f64> for Avx2 {
    type Vector = F64x4;
}

impl Shuffle for I256<u32> {
    #[inline(always)]
    unsafe fn shuffle<const P: i32>(self) -> Self {
        Self::wrap(unsafe { _mm256_shuffle_epi32::<P>(self.0) })
    }
}

impl Shuffle for I256<i32> {
    #[inline(always)]
    unsafe fn shuffle<const P: i32>(self) -> Self {
        Self::wrap(unsafe { _mm256_shuffle_epi32::<P>(self.0) })
    }
}

impl Shuffle for F32x8 {
    #[inline(always)]
    unsafe fn shuffle<const P: i32>(self) -> Self {
        Self(unsafe { _mm256_shuffle_ps::<P>(self.0, self.0) })
    }
}

// 64-bit lanes take the lane-array path
impl Shuffle for I256<u64> {}
impl Shuffle for I256<i64> {}
impl Shuffle for F64x4 {}

impl Backend for Avx2 {
    const NAME: &'static str = "AVX2";
    const REQUIRED: CapabilitySet = CapabilitySet::of(&[Cap::Avx, Cap::Avx2]);
    const PRIORITY: u32 = 30;
}
