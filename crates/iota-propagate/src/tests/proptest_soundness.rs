//! Soundness of interval propagation through linear layers.
//!
//! For any concrete input inside the input box, the floating-point forward
//! pass must land inside the propagated output box. The layers are built with
//! a small tolerance, which dominates the rounding error of the plain forward
//! pass.

use crate::*;
use ndarray::{Array1, Array2};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TOLERANCE: f64 = 1e-9;

fn random_layer(rng: &mut StdRng, outputs: usize, inputs: usize) -> LinearLayer {
    let weight = Array2::from_shape_fn((outputs, inputs), |_| rng.random_range(-2.0..2.0));
    let bias = Array1::from_shape_fn(outputs, |_| rng.random_range(-1.0..1.0));
    LinearLayer::build(weight, bias, TOLERANCE).unwrap()
}

fn random_box(rng: &mut StdRng, dim: usize) -> (Vec<f64>, Vec<f64>) {
    (0..dim)
        .map(|_| {
            let a: f64 = rng.random_range(-5.0..5.0);
            let b: f64 = rng.random_range(-5.0..5.0);
            (a.min(b), a.max(b))
        })
        .unzip()
}

fn assert_inside(output: &BoundsPair, y: &Array1<f64>) {
    for (j, (range, &v)) in output.ranges().iter().zip(y.iter()).enumerate() {
        assert!(
            range.contains(v),
            "output {j}: {v} escapes {range}"
        );
    }
}

#[test]
fn soundness_random_points_seeded() {
    let mut rng = StdRng::seed_from_u64(0x10_7a);
    for _ in 0..10 {
        let layer = random_layer(&mut rng, 4, 6);
        let (lo, hi) = random_box(&mut rng, 6);
        let input = BoundsPair::from_points(&lo, &hi, 0.0).unwrap();
        let output = layer.propagate(&input).unwrap();

        for _ in 0..1000 {
            let x: Vec<f64> = lo
                .iter()
                .zip(&hi)
                .map(|(&l, &h)| if l == h { l } else { rng.random_range(l..=h) })
                .collect();
            assert!(input.contains(&x));
            let y = layer.evaluate(&x).unwrap();
            assert_inside(&output, &y);
        }
    }
}

#[test]
fn soundness_box_corners_seeded() {
    let mut rng = StdRng::seed_from_u64(7);
    let layer = random_layer(&mut rng, 3, 4);
    let (lo, hi) = random_box(&mut rng, 4);
    let output = layer
        .propagate(&BoundsPair::from_points(&lo, &hi, 0.0).unwrap())
        .unwrap();

    // The linear map attains its extremes at vertices of the box.
    for mask in 0u32..16 {
        let x: Vec<f64> = (0..4)
            .map(|i| if mask & (1 << i) != 0 { hi[i] } else { lo[i] })
            .collect();
        assert_inside(&output, &layer.evaluate(&x).unwrap());
    }
}

fn layer_and_box() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<f64>, Vec<(f64, f64)>)> {
    (1usize..5, 1usize..5).prop_flat_map(|(n, m)| {
        (
            prop::collection::vec(prop::collection::vec(-10.0f64..10.0, m), n),
            prop::collection::vec(-10.0f64..10.0, n),
            prop::collection::vec(
                (-10.0f64..10.0, 0.0f64..5.0).prop_map(|(a, w)| (a, a + w)),
                m,
            ),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Midpoint and both corner inputs map inside the output box.
    #[test]
    fn soundness_linear_ibp((weight, bias, bounds) in layer_and_box()) {
        let layer = LinearLayer::from_rows(&weight, &bias, TOLERANCE).unwrap();
        let (lo, hi): (Vec<f64>, Vec<f64>) = bounds.iter().copied().unzip();
        let output = layer.propagate(&BoundsPair::from_points(&lo, &hi, 0.0).unwrap()).unwrap();

        let mid: Vec<f64> = bounds.iter().map(|&(l, h)| l + (h - l) / 2.0).collect();
        for x in [&lo, &hi, &mid] {
            let y = layer.evaluate(x).unwrap();
            for (range, &v) in output.ranges().iter().zip(y.iter()) {
                prop_assert!(range.contains(v), "{} escapes {}", v, range);
            }
        }
    }

    /// Widening the input box never shrinks the output box.
    #[test]
    fn monotonic_in_input_width(
        (weight, bias, bounds) in layer_and_box(),
        grow in 0.0f64..3.0,
    ) {
        let layer = LinearLayer::from_rows(&weight, &bias, 0.0).unwrap();
        let (lo, hi): (Vec<f64>, Vec<f64>) = bounds.iter().copied().unzip();
        let narrow = layer.propagate(&BoundsPair::from_points(&lo, &hi, 0.0).unwrap()).unwrap();
        let wide = layer.propagate(&BoundsPair::from_points(&lo, &hi, grow).unwrap()).unwrap();

        for (n, w) in narrow.ranges().iter().zip(wide.ranges().iter()) {
            prop_assert!(w.inf() <= n.inf(), "lower end grew: {} > {}", w.inf(), n.inf());
            prop_assert!(w.sup() >= n.sup(), "upper end shrank: {} < {}", w.sup(), n.sup());
        }
    }

    /// A robust verdict is never contradicted by a sampled input.
    #[test]
    fn robust_verdict_holds_at_samples((weight, bias, bounds) in layer_and_box()) {
        let layer = LinearLayer::from_rows(&weight, &bias, 0.0).unwrap();
        let (lo, hi): (Vec<f64>, Vec<f64>) = bounds.iter().copied().unzip();
        let output = layer.propagate(&BoundsPair::from_points(&lo, &hi, 0.0).unwrap()).unwrap();
        prop_assume!(output.dim() > 1);

        for label in 0..output.dim() {
            let verdicts = check_full(&output, label, 0.0).unwrap();
            if aggregate(&verdicts).is_robust() {
                let y = layer.evaluate(&lo).unwrap();
                for (i, &v) in y.iter().enumerate() {
                    if i != label {
                        prop_assert!(y[label] > v, "class {} beats robust label {}", i, label);
                    }
                }
            }
        }
    }
}
