//! IEEE-754 binary16 edge weights
//!
//! Encoding never produces a finite value outside the representable range:
//! magnitudes above `MAX` clamp to `MAX`, and non-zero magnitudes below the
//! smallest subnormal become that subnormal instead of flushing to zero.
//! Infinities and NaN are carried through.

/// Largest finite half (0x7bff)
pub const MAX: f32 = 65504.0;

/// Smallest positive subnormal half, 2^-24 (0x0001)
pub const MIN_POSITIVE: f32 = 5.960_464_5e-8;

const SIGN: u16 = 0x8000;
const INF: u16 = 0x7c00;
const NAN: u16 = 0x7e00;
const MAX_BITS: u16 = 0x7bff;

/// f32 -> half with round-to-nearest-even
pub fn encode(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) as u16) & SIGN;

    if value.is_nan() {
        return sign | NAN;
    }
    if value.is_infinite() {
        return sign | INF;
    }

    let abs = value.abs();
    if abs == 0.0 {
        return sign;
    }
    if abs >= MAX {
        return sign | MAX_BITS;
    }
    if abs < MIN_POSITIVE {
        return sign | 0x0001;
    }

    let exp = ((bits >> 23) & 0xff) as i32 - 127;
    let mant = bits & 0x007f_ffff;

    if exp >= -14 {
        let mut half_exp = (exp + 15) as u32;
        let mut m = mant >> 13;
        let rem = mant & 0x1fff;
        if rem > 0x1000 || (rem == 0x1000 && (m & 1) == 1) {
            m += 1;
            if m == 0x400 {
                m = 0;
                half_exp += 1;
            }
        }
        if half_exp >= 31 {
            return sign | MAX_BITS;
        }
        return sign | ((half_exp << 10) as u16) | (m as u16);
    }

    // Subnormal: count units of 2^-24. A carry into 0x400 lands exactly on
    // the smallest normal encoding.
    let full = mant | 0x0080_0000;
    let shift = (-(exp + 1)) as u32;
    let mut m = full >> shift;
    let rem = full & ((1u32 << shift) - 1);
    let halfway = 1u32 << (shift - 1);
    if rem > halfway || (rem == halfway && (m & 1) == 1) {
        m += 1;
    }
    sign | (m as u16)
}

/// half -> f32, exact
pub fn decode(h: u16) -> f32 {
    let negative = h & SIGN != 0;
    let exp = ((h >> 10) & 0x1f) as u32;
    let mant = (h & 0x03ff) as u32;
    let sign = if negative { 0x8000_0000u32 } else { 0 };

    match exp {
        0 if mant == 0 => f32::from_bits(sign),
        0 => {
            let v = mant as f32 * MIN_POSITIVE;
            if negative {
                -v
            } else {
                v
            }
        }
        0x1f => f32::from_bits(sign | 0x7f80_0000 | (mant << 13)),
        _ => f32::from_bits(sign | ((exp + 112) << 23) | (mant << 13)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_values() {
        for v in [0.0f32, 1.0, 2.0, 3.0, 0.5, 1024.0, 65504.0, -7.0] {
            assert_eq!(decode(encode(v)), v, "value {}", v);
        }
        assert_eq!(encode(1.0), 0x3c00);
        assert_eq!(encode(-2.0), 0xc000);
    }

    #[test]
    fn test_relative_error_bound() {
        let bound = 2f32.powi(-11);
        let mut v = 6.2e-5f32; // just above the smallest normal
        while v < 65000.0 {
            let back = decode(encode(v));
            let rel = ((back - v) / v).abs();
            assert!(rel <= bound, "v={} back={} rel={}", v, back, rel);
            v *= 1.0137;
        }
    }

    #[test]
    fn test_infinities_and_nan() {
        assert_eq!(decode(encode(f32::INFINITY)), f32::INFINITY);
        assert_eq!(decode(encode(f32::NEG_INFINITY)), f32::NEG_INFINITY);
        assert!(decode(encode(f32::NAN)).is_nan());
        assert!((decode(encode(f32::NAN)) + 1.0).is_nan());
    }

    #[test]
    fn test_overflow_clamps_to_max() {
        assert_eq!(encode(70000.0), 0x7bff);
        assert_eq!(decode(encode(1e9)), MAX);
        assert_eq!(decode(encode(-1e9)), -MAX);
        // Rounds up past the top binade
        assert_eq!(decode(encode(65519.0)), MAX);
    }

    #[test]
    fn test_underflow_keeps_smallest_subnormal() {
        assert_eq!(encode(1e-12), 0x0001);
        assert_eq!(decode(encode(1e-12)), MIN_POSITIVE);
        assert_eq!(decode(encode(-1e-12)), -MIN_POSITIVE);
    }

    #[test]
    fn test_subnormals() {
        assert_eq!(decode(0x0001), MIN_POSITIVE);
        assert_eq!(decode(0x03ff), 1023.0 * MIN_POSITIVE);
        assert_eq!(encode(3.0 * MIN_POSITIVE), 0x0003);
        assert_eq!(encode(1023.0 * MIN_POSITIVE), 0x03ff);
        // 1023.75 units rounds up to the smallest normal
        assert_eq!(encode(1023.75 * MIN_POSITIVE), 0x0400);
    }

    #[test]
    fn test_signed_zero() {
        assert_eq!(encode(-0.0), 0x8000);
        assert!(decode(0x8000).is_sign_negative());
    }
}
