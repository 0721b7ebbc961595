//! 128-bit x86_64 backend. SSE2 is part of the x86_64 baseline, so every
//! intrinsic here is available without `#[target_feature]`.

use std::arch::x86_64::*;
use std::marker::PhantomData;

use super::{Backend, Register, Shuffle, Vector};
use crate::core::types::{Cap, CapabilitySet};

#[derive(Debug, Clone, Copy)]
pub struct Sse2;

/// Integer lanes of type `T` in one `__m128i`
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct I128<T>(pub __m128i, PhantomData<T>);

impl<T> I128<T> {
    #[inline(always)]
    fn wrap(v: __m128i) -> Self {
        Self(v, PhantomData)
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct F32x4(pub __m128);

#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct F64x2(pub __m128d);

macro_rules! sse2_integer {
    ($t:ty, $lanes:expr, $unpacklo:ident, $unpackhi:ident) => {
        impl Vector for I128<$t> {
            type Lane = $t;
            const LANES: usize = $lanes;

            #[inline(always)]
            unsafe fn load(src: &[$t]) -> Self {
                assert!(src.len() >= $lanes, "load needs {} lanes, got {}", $lanes, src.len());
                Self::wrap(unsafe { _mm_loadu_si128(src.as_ptr() as *const __m128i) })
            }

            #[inline(always)]
            unsafe fn store(self, dst: &mut [$t]) {
                assert!(dst.len() >= $lanes, "store needs {} lanes, got {}", $lanes, dst.len());
                unsafe { _mm_storeu_si128(dst.as_mut_ptr() as *mut __m128i, self.0) }
            }

            #[inline(always)]
            unsafe fn combine_low(self, b: Self) -> Self {
                Self::wrap(unsafe { _mm_unpacklo_epi64(self.0, b.0) })
            }

            #[inline(always)]
            unsafe fn combine_high(self, b: Self) -> Self {
                Self::wrap(unsafe { _mm_unpackhi_epi64(self.0, b.0) })
            }

            #[inline(always)]
            unsafe fn interleave(self, b: Self) -> (Self, Self) {
                unsafe { (Self::wrap($unpacklo(self.0, b.0)), Self::wrap($unpackhi(self.0, b.0))) }
            }
        }

        impl Register<$t> for Sse2 {
            type Vector = I128<$t>;
        }
    };
}

sse2_integer!(u8, 16, _mm_unpacklo_epi8, _mm_unpackhi_epi8);
sse2_integer!(i8, 16, _mm_unpacklo_epi8, _mm_unpackhi_epi8);
sse2_integer!(u16, 8, _mm_unpacklo_epi16, _mm_unpackhi_epi16);
sse2_integer!(i16, 8, _mm_unpacklo_epi16, _mm_unpackhi_epi16);
sse2_integer!(u32, 4, _mm_unpacklo_epi32, _mm_unpackhi_epi32);
sse2_integer!(i32, 4, _mm_unpacklo_epi32, _mm_unpackhi_epi32);
sse2_integer!(u64, 2, _mm_unpacklo_epi64, _mm_unpackhi_epi64);
sse2_integer!(i64, 2, _mm_unpacklo_epi64, _mm_unpackhi_epi64);

impl Vector for F32x4 {
    type Lane = f32;
    const LANES: usize = 4;

    #[inline(always)]
    unsafe fn load(src: &[f32]) -> Self {
        assert!(src.len() >= 4, "load needs 4 lanes, got {}", src.len());
        Self(unsafe { _mm_loadu_ps(src.as_ptr()) })
    }

    #[inline(always)]
    unsafe fn store(self, dst: &mut [f32]) {
        assert!(dst.len() >= 4, "store needs 4 lanes, got {}", dst.len());
        unsafe { _mm_storeu_ps(dst.as_mut_ptr(), self.0) }
    }

    #[inline(always)]
    unsafe fn combine_low(self, b: Self) -> Self {
        Self(unsafe { _mm_movelh_ps(self.0, b.0) })
    }

    #[inline(always)]
    unsafe fn combine_high(self, b: Self) -> Self {
        // movehl takes the high halves in (second, first) order
        Self(unsafe { _mm_movehl_ps(b.0, self.0) })
    }

    #[inline(always)]
    unsafe fn interleave(self, b: Self) -> (Self, Self) {
        unsafe { (Self(_mm_unpacklo_ps(self.0, b.0)), Self(_mm_unpackhi_ps(self.0, b.0))) }
    }

    #[inline(always)]
    unsafe fn deinterleave(self, b: Self) -> (Self, Self) {
        unsafe {
            (
                Self(_mm_shuffle_ps::<0b10_00_10_00>(self.0, b.0)),
                Self(_mm_shuffle_ps::<0b11_01_11_01>(self.0, b.0)),
            )
        }
    }
}

impl Vector for F64x2 {
    type Lane = f64;
    const LANES: usize = 2;

    #[inline(always)]
    unsafe fn load(src: &[f64]) -> Self {
        assert!(src.len() >= 2, "load needs 2 lanes, got {}", src.len());
        Self(unsafe { _mm_loadu_pd(src.as_ptr()) })
    }

    #[inline(always)]
    unsafe fn store(self, dst: &mut [f64]) {
        assert!(dst.len() >= 2, "store needs 2 lanes, got {}", dst.len());
        unsafe { _mm_storeu_pd(dst.as_mut_ptr(), self.0) }
    }

    #[inline(always)]
    unsafe fn combine_low(self, b: Self) -> Self {
        Self(unsafe { _mm_unpacklo_pd(self.0, b.0) })
    }

    #[inline(always)]
    unsafe fn combine_high(self, b: Self) -> Self {
        Self(unsafe { _mm_unpackhi_pd(self.0, b.0) })
    }

    #[inline(always)]
    unsafe fn interleave(self, b: Self) -> (Self, Self) {
        // With two lanes, interleave is the combine pair
        unsafe { (self.combine_low(b), self.combine_high(b)) }
    }

    #[inline(always)]
    unsafe fn deinterleave(self, b: Self) -> (Self, Self) {
        unsafe { (self.combine_low(b), self.combine_high(b)) }
    }
}

impl Register<f32> for Sse2 {
    type Vector = F32x4;
}

impl Register<f64> for Sse2 {
    type Vector = F64x2;
}

impl Shuffle for I128<u32> {
    #[inline(always)]
    unsafe fn shuffle<const P: i32>(self) -> Self {
        Self::wrap(unsafe { _mm_shuffle_epi32::<P>(self.0) })
    }
}

impl Shuffle for I128<i32> {
    #[inline(always)]
    unsafe fn shuffle<const P: i32>(self) -> Self {
        Self::wrap(unsafe { _mm_shuffle_epi32::<P>(self.0) })
    }
}

impl Shuffle for F32x4 {
    #[inline(always)]
    unsafe fn shuffle<const P: i32>(self) -> Self {
        Self(unsafe { _mm_shuffle_ps::<P>(self.0, self.0) })
    }
}

impl Shuffle for F64x2 {
    #[inline(always)]
    unsafe fn shuffle<const P: i32>(self) -> Self {
        Self(unsafe { _mm_shuffle_pd::<P>(self.0, self.0) })
    }
}

impl Shuffle for I128<u64> {
    #[inline(always)]
    unsafe fn shuffle<const P: i32>(self) -> Self {
        unsafe {
            let v = _mm_castsi128_pd(self.0);
            Self::wrap(_mm_castpd_si128(_mm_shuffle_pd::<P>(v, v)))
        }
    }
}

impl Shuffle for I128<i64> {
    #[inline(always)]
    unsafe fn shuffle<const P: i32>(self) -> Self {
        unsafe {
            let v = _mm_castsi128_pd(self.0);
            Self::wrap(_mm_castpd_si128(_mm_shuffle_pd::<P>(v, v)))
        }
    }
}

impl Backend for Sse2 {
    const NAME: &'static str = "SSE2";
    const REQUIRED: CapabilitySet = CapabilitySet::of(&[Cap::Sse, Cap::Sse2]);
    const PRIORITY: u32 = 20;
}
