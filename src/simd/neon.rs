//! 128-bit aarch64 backend over the native NEON vector types. NEON is
//! mandatory on aarch64.

use std::arch::aarch64::*;

use super::{Backend, Register, Shuffle, Vector};
use crate::core::types::{Cap, CapabilitySet};

#[derive(Debug, Clone, Copy)]
pub struct Neon;

macro_rules! neon_vector {
    (
        $t:ty, $v:ty, $lanes:expr,
        $ld:ident, $st:ident, $low:ident, $high:ident, $combine:ident,
        $zip1:ident, $zip2:ident, $uzp1:ident, $uzp2:ident
    ) => {
        impl Vector for $v {
            type Lane = $t;
            const LANES: usize = $lanes;

            #[inline(always)]
            unsafe fn load(src: &[$t]) -> Self {
                assert!(src.len() >= $lanes, "load needs {} lanes, got {}", $lanes, src.len());
                unsafe { $ld(src.as_ptr()) }
            }

            #[inline(always)]
            unsafe fn store(self, dst: &mut [$t]) {
                assert!(dst.len() >= $lanes, "store needs {} lanes, got {}", $lanes, dst.len());
                unsafe { $st(dst.as_mut_ptr(), self) }
            }

            #[inline(always)]
            unsafe fn combine_low(self, b: Self) -> Self {
                unsafe { $combine($low(self), $low(b)) }
            }

            #[inline(always)]
            unsafe fn combine_high(self, b: Self) -> Self {
                unsafe { $combine($high(self), $high(b)) }
            }

            #[inline(always)]
            unsafe fn interleave(self, b: Self) -> (Self, Self) {
                unsafe { ($zip1(self, b), $zip2(self, b)) }
            }

            #[inline(always)]
            unsafe fn deinterleave(self, b: Self) -> (Self, Self) {
                unsafe { ($uzp1(self, b), $uzp2(self, b)) }
            }
        }

        impl Register<$t> for Neon {
            type Vector = $v;
        }
    };
}

neon_vector!(u8, uint8x16_t, 16, vld1q_u8, vst1q_u8, vget_low_u8, vget_high_u8, vcombine_u8,
    vzip1q_u8, vzip2q_u8, vuzp1q_u8, vuzp2q_u8);
neon_vector!(i8, int8x16_t, 16, vld1q_s8, vst1q_s8, vget_low_s8, vget_high_s8, vcombine_s8,
    vzip1q_s8, vzip2q_s8, vuzp1q_s8, vuzp2q_s8);
neon_vector!(u16, uint16x8_t, 8, vld1q_u16, vst1q_u16, vget_low_u16, vget_high_u16, vcombine_u16,
    vzip1q_u16, vzip2q_u16, vuzp1q_u16, vuzp2q_u16);
neon_vector!(i16, int16x8_t, 8, vld1q_s16, vst1q_s16, vget_low_s16, vget_high_s16, vcombine_s16,
    vzip1q_s16, vzip2q_s16, vuzp1q_s16, vuzp2q_s16);
neon_vector!(u32, uint32x4_t, 4, vld1q_u32, vst1q_u32, vget_low_u32, vget_high_u32, vcombine_u32,
    vzip1q_u32, vzip2q_u32, vuzp1q_u32, vuzp2q_u32);
neon_vector!(i32, int32x4_t, 4, vld1q_s32, vst1q_s32, vget_low_s32, vget_high_s32, vcombine_s32,
    vzip1q_s32, vzip2q_s32, vuzp1q_s32, vuzp2q_s32);
neon_vector!(u64, uint64x2_t, 2, vld1q_u64, vst1q_u64, vget_low_u64, vget_high_u64, vcombine_u64,
    vzip1q_u64, vzip2q_u64, vuzp1q_u64, vuzp2q_u64);
neon_vector!(i64, int64x2_t, 2, vld1q_s64, vst1q_s64, vget_low_s64, vget_high_s64, vcombine_s64,
    vzip1q_s64, vzip2q_s64, vuzp1q_s64, vuzp2q_s64);
neon_vector!(f32, float32x4_t, 4, vld1q_f32, vst1q_f32, vget_low_f32, vget_high_f32, vcombine_f32,
    vzip1q_f32, vzip2q_f32, vuzp1q_f32, vuzp2q_f32);
neon_vector!(f64, float64x2_t, 2, vld1q_f64, vst1q_f64, vget_low_f64, vget_high_f64, vcombine_f64,
    vzip1q_f64, vzip2q_f64, vuzp1q_f64, vuzp2q_f64);

// NEON has no immediate-pattern shuffle; permutations take the lane-array path
impl Shuffle for uint32x4_t {}
impl Shuffle for int32x4_t {}
impl Shuffle for float32x4_t {}
impl Shuffle for uint64x2_t {}
impl Shuffle for int64x2_t {}
impl Shuffle for float64x2_t {}

impl Backend for Neon {
    const NAME: &'static str = "NEON";
    const REQUIRED: CapabilitySet = CapabilitySet::of(&[Cap::Neon]);
    const PRIORITY: u32 = 20;
}
