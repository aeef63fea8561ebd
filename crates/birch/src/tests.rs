use approx::assert_abs_diff_eq;

use super::*;

/// diamond silicon, roughly
const P: [f64; 4] = [-107.654321, 20.44, 0.6, 4.2];

fn synthetic(volumes: &[f64]) -> Vec<(f64, f64)> {
    volumes.iter().map(|&v| (v, Birch::eval(&P, v))).collect()
}

#[test]
fn recover_synthetic_parameters() {
    let points =
        synthetic(&[17.0, 18.0, 19.0, 20.0, 21.0, 22.0, 23.0, 24.0]);
    let got = Birch::new(&points).unwrap().fit().unwrap();
    assert_abs_diff_eq!(got.e0, P[0], epsilon = 1e-8);
    assert_abs_diff_eq!(got.v0, P[1], epsilon = 1e-6);
    assert_abs_diff_eq!(got.b0, P[2], epsilon = 1e-6);
    assert_abs_diff_eq!(got.bp, P[3], epsilon = 1e-4);
    assert!(got.rss < 1e-12);
}

#[test]
fn recover_with_noise() {
    // +/- 0.1 meV of deterministic "noise"
    let points: Vec<_> = synthetic(&[17.0, 18.5, 20.0, 21.5, 23.0])
        .into_iter()
        .enumerate()
        .map(|(i, (v, e))| (v, e + 1e-4 * if i % 2 == 0 { 1.0 } else { -1.0 }))
        .collect();
    let got = Birch::new(&points).unwrap().fit().unwrap();
    assert_abs_diff_eq!(got.v0, P[1], epsilon = 1e-2);
    assert_abs_diff_eq!(got.b0, P[2], epsilon = 1e-2);
}

#[test]
fn too_few_points() {
    let points = synthetic(&[18.0, 20.0, 22.0]);
    let err = Birch::new(&points).unwrap_err();
    assert!(err.0.contains("at least 4"));
}

#[test]
fn negative_volume() {
    let points =
        vec![(18.0, -1.0), (-20.0, -1.1), (22.0, -1.0), (24.0, -0.9)];
    let err = Birch::new(&points).unwrap_err();
    assert!(err.0.contains("non-positive volume"));
}

#[test]
fn no_minimum() {
    // an energy maximum instead of a minimum
    let points: Vec<_> = (1..=5)
        .map(|i| {
            let v = 18.0 + i as f64;
            (v, -(v - 20.0) * (v - 20.0))
        })
        .collect();
    let err = Birch::new(&points).unwrap().fit().unwrap_err();
    assert!(err.0.contains("no energy minimum"));
}

#[test]
fn iteration_cap() {
    let points = synthetic(&[17.0, 19.0, 21.0, 23.0]);
    // one step from the quadratic seed is nowhere near the tolerance
    let err = Birch::new(&points).unwrap().fit_with(1).unwrap_err();
    assert!(err.0.contains("too many iterations"));
}

#[test]
fn gpa_conversion() {
    let fit = EosFit {
        e0: 0.0,
        v0: 20.0,
        b0: 1.0,
        bp: 4.0,
        rss: 0.0,
    };
    assert_abs_diff_eq!(fit.b0_gpa(), 160.21766208, epsilon = 1e-12);
}

#[test]
fn eval_at_equilibrium() {
    assert_abs_diff_eq!(Birch::eval(&P, P[1]), P[0], epsilon = 1e-12);
}
