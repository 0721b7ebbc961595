use super::{Backend, Lane, Register, Shuffle, Vector};
use crate::core::types::CapabilitySet;

/// Portable 128-bit backend; runs anywhere
#[derive(Debug, Clone, Copy)]
pub struct Scalar;

/// `N` lanes held in a plain array
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lanes<T: Lane, const N: usize>(pub [T; N]);

impl<T: Lane, const N: usize> Vector for Lanes<T, N> {
    type Lane = T;
    const LANES: usize = N;

    #[inline(always)]
    unsafe fn load(src: &[T]) -> Self {
        let mut lanes = [T::default(); N];
        lanes.copy_from_slice(&src[..N]);
        Self(lanes)
    }

    #[inline(always)]
    unsafe fn store(self, dst: &mut [T]) {
        dst[..N].copy_from_slice(&self.0);
    }

    #[inline(always)]
    unsafe fn combine_low(self, b: Self) -> Self {
        let h = N / 2;
        let mut out = [T::default(); N];
        out[..h].copy_from_slice(&self.0[..h]);
        out[h..].copy_from_slice(&b.0[..h]);
        Self(out)
    }

    #[inline(always)]
    unsafe fn combine_high(self, b: Self) -> Self {
        let h = N / 2;
        let mut out = [T::default(); N];
        out[..h].copy_from_slice(&self.0[h..]);
        out[h..].copy_from_slice(&b.0[h..]);
        Self(out)
    }

    #[inline(always)]
    unsafe fn interleave(self, b: Self) -> (Self, Self) {
        let h = N / 2;
        let mut low = [T::default(); N];
        let mut high = [T::default(); N];
        for i in 0..h {
            low[2 * i] = self.0[i];
            low[2 * i + 1] = b.0[i];
            high[2 * i] = self.0[h + i];
            high[2 * i + 1] = b.0[h + i];
        }
        (Self(low), Self(high))
    }

    #[inline(always)]
    unsafe fn deinterleave(self, b: Self) -> (Self, Self) {
        let h = N / 2;
        let mut evens = [T::default(); N];
        let mut odds = [T::default(); N];
        for i in 0..h {
            evens[i] = self.0[2 * i];
            odds[i] = self.0[2 * i + 1];
            evens[h + i] = b.0[2 * i];
            odds[h + i] = b.0[2 * i + 1];
        }
        (Self(evens), Self(odds))
    }
}

impl Shuffle for Lanes<u32, 4> {}
impl Shuffle for Lanes<i32, 4> {}
impl Shuffle for Lanes<f32, 4> {}
impl Shuffle for Lanes<u64, 2> {}
impl Shuffle for Lanes<i64, 2> {}
impl Shuffle for Lanes<f64, 2> {}

macro_rules! scalar_registers {
    ($($t:ty => $n:expr),* $(,)?) => {
        $(impl Register<$t> for Scalar {
            type Vector = Lanes<$t, $n>;
        })*
    };
}

scalar_registers! {
    u8 => 16, i8 => 16,
    u16 => 8, i16 => 8,
    u32 => 4, i32 => 4,
    u64 => 2, i64 => 2,
    f32 => 4, f64 => 2,
}

impl Backend for Scalar {
    const NAME: &'static str = "baseline";
    const REQUIRED: CapabilitySet = CapabilitySet::EMPTY;
    const PRIORITY: u32 = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::tests::check_backend;

    #[test]
    fn test_scalar_backend() {
        unsafe { check_backend::<Scalar>() };
    }

    #[test]
    fn test_lane_layout() {
        let a = Lanes([1u16, 2, 3, 4, 5, 6, 7, 8]);
        let b = Lanes([11u16, 12, 13, 14, 15, 16, 17, 18]);
        unsafe {
            assert_eq!(a.combine_low(b).0, [1, 2, 3, 4, 11, 12, 13, 14]);
            assert_eq!(a.combine_high(b).0, [5, 6, 7, 8, 15, 16, 17, 18]);
            let (low, high) = a.interleave(b);
            assert_eq!(low.0, [1, 11, 2, 12, 3, 13, 4, 14]);
            assert_eq!(high.0, [5, 15, 6, 16, 7, 17, 8, 18]);
        }
    }

    #[test]
    #[should_panic]
    fn test_short_load_panics() {
        let short = [1.0f32, 2.0];
        let _ = unsafe { <Lanes<f32, 4> as Vector>::load(&short) };
    }
}
