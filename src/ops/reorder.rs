//! Lane reordering: zip two slices, split one, swap neighbours
//!
//! The vector loop covers whole registers; the remainder is finished with
//! scalar code, so every variant produces identical output for any length.

use thiserror::Error;

use crate::simd::{Lane, Register, Shuffle, Vector, VectorOf, pattern4};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("input lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("output holds {actual} elements, {expected} required")]
    OutputSize { expected: usize, actual: usize },

    #[error("interleaved input has odd length {0}")]
    OddLength(usize),
}

/// # Safety
/// The CPU must support `B`. `out` holds at least `2 * a.len()` and
/// `b.len() >= a.len()`.
#[inline(always)]
unsafe fn interleave<B: Register<T>, T: Lane>(a: &[T], b: &[T], out: &mut [T]) {
    let step = <VectorOf<B, T> as Vector>::LANES;
    let n = a.len();
    let mut i = 0;
    while i + step <= n {
        unsafe {
            let va = <VectorOf<B, T> as Vector>::load(&a[i..]);
            let vb = <VectorOf<B, T> as Vector>::load(&b[i..]);
            let (low, high) = va.interleave(vb);
            low.store(&mut out[2 * i..]);
            high.store(&mut out[2 * i + step..]);
        }
        i += step;
    }
    for j in i..n {
        out[2 * j] = a[j];
        out[2 * j + 1] = b[j];
    }
}

/// # Safety
/// The CPU must support `B`. `src.len() == 2 * evens.len()` and
/// `odds.len() >= evens.len()`.
#[inline(always)]
unsafe fn deinterleave<B: Register<T>, T: Lane>(src: &[T], evens: &mut [T], odds: &mut [T]) {
    let step = <VectorOf<B, T> as Vector>::LANES;
    let n = evens.len();
    let mut i = 0;
    while i + step <= n {
        unsafe {
            let low = <VectorOf<B, T> as Vector>::load(&src[2 * i..]);
            let high = <VectorOf<B, T> as Vector>::load(&src[2 * i + step..]);
            let (e, o) = low.deinterleave(high);
            e.store(&mut evens[i..]);
            o.store(&mut odds[i..]);
        }
        i += step;
    }
    for j in i..n {
        evens[j] = src[2 * j];
        odds[j] = src[2 * j + 1];
    }
}

/// # Safety
/// The CPU must support `B`. `dst.len() >= src.len()`.
#[inline(always)]
unsafe fn swap_pairs<B: Register<f32>>(src: &[f32], dst: &mut [f32])
where
    VectorOf<B, f32>: Shuffle,
{
    const SWAP: i32 = pattern4(1, 0, 3, 2);

    let step = <VectorOf<B, f32> as Vector>::LANES;
    let n = src.len();
    let mut i = 0;
    while i + step <= n {
        unsafe {
            let v = <VectorOf<B, f32> as Vector>::load(&src[i..]);
            v.shuffle::<SWAP>().store(&mut dst[i..]);
        }
        i += step;
    }
    while i + 1 < n {
        dst[i] = src[i + 1];
        dst[i + 1] = src[i];
        i += 2;
    }
    // An odd trailing element has no partner
    if i < n {
        dst[i] = src[i];
    }
}

dispatched! {
    INTERLEAVE_U8 in interleave_u8_variants = "interleave_u8"
        => interleave::<_, u8>(a: &[u8], b: &[u8], out: &mut [u8])
}

dispatched! {
    INTERLEAVE_F32 in interleave_f32_variants = "interleave_f32"
        => interleave::<_, f32>(a: &[f32], b: &[f32], out: &mut [f32])
}

dispatched! {
    DEINTERLEAVE_F32 in deinterleave_f32_variants = "deinterleave_f32"
        => deinterleave::<_, f32>(src: &[f32], evens: &mut [f32], odds: &mut [f32])
}

dispatched! {
    SWAP_PAIRS_F32 in swap_pairs_f32_variants = "swap_pairs_f32"
        => swap_pairs::<_>(src: &[f32], dst: &mut [f32])
}

fn check_zip<T>(a: &[T], b: &[T], out: &[T]) -> Result<(), ReorderError> {
    if a.len() != b.len() {
        return Err(ReorderError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if out.len() != 2 * a.len() {
        return Err(ReorderError::OutputSize {
            expected: 2 * a.len(),
            actual: out.len(),
        });
    }
    Ok(())
}

/// `out = [a[0], b[0], a[1], b[1], ...]`
pub fn interleave_u8(a: &[u8], b: &[u8], out: &mut [u8]) -> Result<(), ReorderError> {
    check_zip(a, b, out)?;
    INTERLEAVE_U8.entry()(a, b, out);
    Ok(())
}

/// `out = [a[0], b[0], a[1], b[1], ...]`
pub fn interleave_f32(a: &[f32], b: &[f32], out: &mut [f32]) -> Result<(), ReorderError> {
    check_zip(a, b, out)?;
    INTERLEAVE_F32.entry()(a, b, out);
    Ok(())
}

/// Split `src` into its even-index and odd-index elements
pub fn deinterleave_f32(src: &[f32], evens: &mut [f32], odds: &mut [f32]) -> Result<(), ReorderError> {
    if src.len() % 2 != 0 {
        return Err(ReorderError::OddLength(src.len()));
    }
    let half = src.len() / 2;
    for side in [evens.len(), odds.len()] {
        if side != half {
            return Err(ReorderError::OutputSize {
                expected: half,
                actual: side,
            });
        }
    }
    DEINTERLEAVE_F32.entry()(src, evens, odds);
    Ok(())
}

/// Swap each element with its neighbour: `[1, 0, 3, 2, ...]`
/// An odd trailing element is copied unchanged
pub fn swap_pairs_f32(src: &[f32], dst: &mut [f32]) -> Result<(), ReorderError> {
    if dst.len() != src.len() {
        return Err(ReorderError::OutputSize {
            expected: src.len(),
            actual: dst.len(),
        });
    }
    SWAP_PAIRS_F32.entry()(src, dst);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::{Backend, Scalar};
    use rand::Rng;

    fn random_f32(n: usize) -> Vec<f32> {
        let mut rng = rand::thread_rng();
        (0..n).map(|_| rng.gen_range(-100.0..100.0)).collect()
    }

    fn random_u8(n: usize) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        (0..n).map(|_| rng.r#gen::<u8>()).collect()
    }

    // Lengths around every register width, so both loops and tails run
    const LENGTHS: [usize; 12] = [0, 1, 2, 3, 4, 7, 8, 15, 16, 31, 33, 70];

    /// Runs every kernel for `B` and compares it with a plain loop
    /// # Safety
    /// The CPU must support B
    unsafe fn check_kernels<B: Backend>()
    where
        VectorOf<B, f32>: Shuffle,
    {
        for n in LENGTHS {
            let a = random_u8(n);
            let b = random_u8(n);
            let mut out = vec![0u8; 2 * n];
            unsafe { interleave::<B, u8>(&a, &b, &mut out) };
            let expected: Vec<u8> = a.iter().zip(&b).flat_map(|(x, y)| [*x, *y]).collect();
            assert_eq!(out, expected, "{} interleave_u8, n = {}", B::NAME, n);

            let a = random_f32(n);
            let b = random_f32(n);
            let mut out = vec![0.0f32; 2 * n];
            unsafe { interleave::<B, f32>(&a, &b, &mut out) };
            let expected: Vec<f32> = a.iter().zip(&b).flat_map(|(x, y)| [*x, *y]).collect();
            assert_eq!(out, expected, "{} interleave_f32, n = {}", B::NAME, n);

            let mut evens = vec![0.0f32; n];
            let mut odds = vec![0.0f32; n];
            unsafe { deinterleave::<B, f32>(&out, &mut evens, &mut odds) };
            assert_eq!(evens, a, "{} deinterleave evens, n = {}", B::NAME, n);
            assert_eq!(odds, b, "{} deinterleave odds, n = {}", B::NAME, n);

            let src = random_f32(n);
            let mut dst = vec![0.0f32; n];
            unsafe { swap_pairs::<B>(&src, &mut dst) };
            for (i, value) in dst.iter().enumerate() {
                let from = if i % 2 == 0 { i + 1 } else { i - 1 };
                let from = if from < n { from } else { i };
                assert_eq!(*value, src[from], "{} swap_pairs, n = {}, i = {}", B::NAME, n, i);
            }
        }
    }

    #[test]
    fn test_scalar_kernels() {
        unsafe { check_kernels::<Scalar>() };
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_x86_kernels() {
        unsafe { check_kernels::<crate::simd::Sse2>() };
        if is_x86_feature_detected!("avx2") {
            unsafe { check_kernels::<crate::simd::Avx2>() };
        }
    }

    #[cfg(target_arch = "aarch64")]
    #[test]
    fn test_neon_kernels() {
        unsafe { check_kernels::<crate::simd::Neon>() };
    }

    #[test]
    fn test_every_variant_matches_baseline() {
        let a = random_f32(37);
        let b = random_f32(37);
        let mut expected = vec![0.0f32; 74];
        (interleave_f32_variants::baseline)(&a, &b, &mut expected);

        for variant in INTERLEAVE_F32.variants() {
            let mut out = vec![0.0f32; 74];
            if variant.required.is_subset_of(crate::registry::detect()) {
                (variant.entry)(&a, &b, &mut out);
                assert_eq!(out, expected, "variant {}", variant.name);
            }
        }
    }

    #[test]
    fn test_dispatched_entry_points() {
        let mut out = [0u8; 6];
        interleave_u8(&[1, 2, 3], &[7, 8, 9], &mut out).unwrap();
        assert_eq!(out, [1, 7, 2, 8, 3, 9]);

        let src: Vec<f32> = (0..9).map(|i| i as f32).collect();
        let mut evens = [0.0f32; 4];
        let mut odds = [0.0f32; 4];
        assert_eq!(deinterleave_f32(&src, &mut evens, &mut odds), Err(ReorderError::OddLength(9)));
        deinterleave_f32(&src[..8], &mut evens, &mut odds).unwrap();
        assert_eq!(evens, [0.0, 2.0, 4.0, 6.0]);
        assert_eq!(odds, [1.0, 3.0, 5.0, 7.0]);

        let mut dst = [0.0f32; 9];
        swap_pairs_f32(&src, &mut dst).unwrap();
        assert_eq!(dst, [1.0, 0.0, 3.0, 2.0, 5.0, 4.0, 7.0, 6.0, 8.0]);
    }

    #[test]
    fn test_shape_errors() {
        let mut out = [0.0f32; 4];
        assert_eq!(
            interleave_f32(&[1.0, 2.0], &[3.0], &mut out),
            Err(ReorderError::LengthMismatch { left: 2, right: 1 })
        );
        assert_eq!(
            interleave_f32(&[1.0], &[3.0], &mut out),
            Err(ReorderError::OutputSize { expected: 2, actual: 4 })
        );
        let mut short = [0.0f32; 1];
        assert_eq!(
            swap_pairs_f32(&[1.0, 2.0], &mut short),
            Err(ReorderError::OutputSize { expected: 2, actual: 1 })
        );
        // Empty inputs are valid
        assert_eq!(interleave_u8(&[], &[], &mut []), Ok(()));
    }
}
