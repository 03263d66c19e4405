//! Directed rounding for `f64` addition and multiplication.
//!
//! The hardware rounds to nearest. Each operation here recovers the exact
//! rounding error with an error-free transformation (TwoSum for addition, FMA
//! for multiplication) and steps one ulp in the requested direction only when
//! the rounded result is not exact. Exact results, which are the common case
//! for small integers and zero tolerances, come back unchanged.

/// Rounding error products below this magnitude may lose bits to gradual
/// underflow, so their sign is not trusted.
const UNDERFLOW_GUARD: f64 = f64::MIN_POSITIVE * 4_611_686_018_427_387_904.0; // 2^-960

/// Sum rounded toward negative infinity.
#[inline]
pub fn add_down(a: f64, b: f64) -> f64 {
    let (s, err) = two_sum(a, b);
    if s.is_finite() {
        if err < 0.0 {
            s.next_down()
        } else {
            s
        }
    } else {
        unbounded_down(s, a.is_finite() && b.is_finite(), a.is_nan() || b.is_nan())
    }
}

/// Sum rounded toward positive infinity.
#[inline]
pub fn add_up(a: f64, b: f64) -> f64 {
    let (s, err) = two_sum(a, b);
    if s.is_finite() {
        if err > 0.0 {
            s.next_up()
        } else {
            s
        }
    } else {
        unbounded_up(s, a.is_finite() && b.is_finite(), a.is_nan() || b.is_nan())
    }
}

/// Difference `a - b` rounded toward negative infinity.
#[inline]
pub fn sub_down(a: f64, b: f64) -> f64 {
    add_down(a, -b)
}

/// Difference `a - b` rounded toward positive infinity.
#[inline]
pub fn sub_up(a: f64, b: f64) -> f64 {
    add_up(a, -b)
}

/// Product rounded toward negative infinity.
///
/// A zero factor gives zero even against an infinite one.
#[inline]
pub fn mul_down(a: f64, b: f64) -> f64 {
    match two_prod(a, b) {
        Some((p, _)) if !p.is_finite() => {
            unbounded_down(p, a.is_finite() && b.is_finite(), a.is_nan() || b.is_nan())
        }
        Some((p, err)) if err < 0.0 => p.next_down(),
        Some((p, _)) => p,
        None => (a * b).next_down(),
    }
}

/// Product rounded toward positive infinity.
///
/// A zero factor gives zero even against an infinite one.
#[inline]
pub fn mul_up(a: f64, b: f64) -> f64 {
    match two_prod(a, b) {
        Some((p, _)) if !p.is_finite() => {
            unbounded_up(p, a.is_finite() && b.is_finite(), a.is_nan() || b.is_nan())
        }
        Some((p, err)) if err > 0.0 => p.next_up(),
        Some((p, _)) => p,
        None => (a * b).next_up(),
    }
}

/// Lower bound for a non-finite rounded result.
///
/// Overflow from finite operands stays at `MAX` on the way down, and an
/// indeterminate form such as `inf - inf` is unbounded below.
#[inline]
fn unbounded_down(r: f64, finite_operands: bool, nan_operand: bool) -> f64 {
    if nan_operand {
        f64::NAN
    } else if r.is_nan() {
        f64::NEG_INFINITY
    } else if r == f64::INFINITY && finite_operands {
        f64::MAX
    } else {
        r
    }
}

/// Upper bound for a non-finite rounded result.
#[inline]
fn unbounded_up(r: f64, finite_operands: bool, nan_operand: bool) -> f64 {
    if nan_operand {
        f64::NAN
    } else if r.is_nan() {
        f64::INFINITY
    } else if r == f64::NEG_INFINITY && finite_operands {
        -f64::MAX
    } else {
        r
    }
}

/// Knuth's TwoSum: `s + err == a + b` exactly.
#[inline]
fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    if !s.is_finite() {
        return (s, 0.0);
    }
    let bb = s - a;
    let err = (a - (s - bb)) + (b - bb);
    (s, err)
}

/// Product with its exact error, or `None` when the error sign is unreliable
/// because the product sits in the underflow range.
#[inline]
fn two_prod(a: f64, b: f64) -> Option<(f64, f64)> {
    if a == 0.0 || b == 0.0 {
        return Some((0.0, 0.0));
    }
    let p = a * b;
    if !p.is_finite() {
        return Some((p, 0.0));
    }
    if p.abs() < UNDERFLOW_GUARD {
        return None;
    }
    Some((p, a.mul_add(b, -p)))
}
