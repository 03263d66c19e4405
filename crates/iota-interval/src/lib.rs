//! Interval arithmetic kernel for iota.
//!
//! Provides the closed [`Interval`] type with outward rounding and the
//! [`IntervalMatrix`] linear-algebra kernel (sign split, matrix product,
//! vector sums) used by bound propagation.

pub mod interval;
pub mod matrix;
pub mod rounding;

pub use interval::Interval;
pub use matrix::{
    mat_mul, max_upper, max_upper_excluding, negative_part, positive_part,
    sign_split, vec_add, IntervalMatrix,
};

#[cfg(test)]
mod proptests {
    use super::*;
    use ndarray::Array2;
    use proptest::prelude::*;

    fn interval_strategy() -> impl Strategy<Value = Interval> {
        (-100.0f64..100.0, -100.0f64..100.0).prop_map(|(a, b)| Interval::new(a.min(b), a.max(b)))
    }

    fn matrix_strategy() -> impl Strategy<Value = IntervalMatrix> {
        (1usize..5, 1usize..5).prop_flat_map(|(n, m)| {
            proptest::collection::vec(interval_strategy(), n * m).prop_map(move |cells| {
                IntervalMatrix::new(
                    Array2::from_shape_vec((n, m), cells).expect("shape matches cell count"),
                )
            })
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// pos + neg reproduces the matrix, pos >= 0 and neg <= 0 entrywise.
        #[test]
        fn sign_split_is_exact_and_signed(m in matrix_strategy()) {
            let (pos, neg) = sign_split(&m);
            let sum = pos.add(&neg).unwrap();
            prop_assert_eq!(&sum, &m);
            for p in pos.iter() {
                prop_assert!(p.inf() >= 0.0, "positive part has negative end: {}", p);
            }
            for q in neg.iter() {
                prop_assert!(q.sup() <= 0.0, "negative part has positive end: {}", q);
            }
        }

        /// The interval product encloses every product of members.
        #[test]
        fn mul_encloses_member_products(
            a in interval_strategy(),
            b in interval_strategy(),
            s in 0.0f64..=1.0,
            t in 0.0f64..=1.0,
        ) {
            let x = a.inf() + (a.sup() - a.inf()) * s;
            let y = b.inf() + (b.sup() - b.inf()) * t;
            let x = x.clamp(a.inf(), a.sup());
            let y = y.clamp(b.inf(), b.sup());
            prop_assert!((a * b).contains(x * y));
        }

        /// The interval sum encloses every sum of members.
        #[test]
        fn add_encloses_member_sums(
            a in interval_strategy(),
            b in interval_strategy(),
            s in 0.0f64..=1.0,
        ) {
            let x = (a.inf() + (a.sup() - a.inf()) * s).clamp(a.inf(), a.sup());
            let y = (b.inf() + (b.sup() - b.inf()) * s).clamp(b.inf(), b.sup());
            prop_assert!((a + b).contains(x + y));
        }
    }
}
