use approx::assert_abs_diff_eq;
use fbqs::params::Value;

use super::*;

#[test]
fn load_full_config() {
    let got = Config::load("testfiles/fbeos.toml");
    assert_eq!(got.structure.natoms(), 2);
    assert_eq!(got.structure.atoms[0].atomic_number, 14);
    assert_abs_diff_eq!(got.structure.cell[1][1], 5.43, epsilon = 1e-12);
    assert_eq!(got.kpoints, Kpoints::Mesh([2, 2, 2]));
    assert_eq!(got.scale_factors.len(), 7);
    assert_abs_diff_eq!(got.scale_factors[0], 0.94, epsilon = 1e-12);
    assert_abs_diff_eq!(got.scale_factors[3], 1.00, epsilon = 1e-12);
    assert_abs_diff_eq!(got.scale_factors[6], 1.06, epsilon = 1e-12);
    assert_eq!(got.axes, [true; 3]);
    assert_eq!(got.queue, Queue::Local);
    assert_eq!(
        got.params.get("OPTION", "iquench"),
        Some(&Value::Int(-1))
    );
    assert_eq!(
        got.params.get("QUENCH", "energytol"),
        Some(&Value::Real(1e-5))
    );
    assert_eq!(got.queue_template, None);
    assert_eq!(got.settings, Settings::default());
}

#[test]
fn explicit_scale_factors() {
    let config: Config = toml::from_str(
        r#"
geometry = "C 0.0 0.0 0.0"
cell = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
fdata = "Fdata"
scale_factors = [0.98, 0.99, 1.0, 1.01, 1.02]
axes = [false, false, true]
queue = "slurm"
sleep_int = 60
job_limit = 128
chunk_size = 1

[params.OPTION]
icluster = 0
"#,
    )
    .unwrap();
    assert_eq!(config.scale_factors, vec![0.98, 0.99, 1.0, 1.01, 1.02]);
    assert_eq!(config.axes, [false, false, true]);
    assert_eq!(config.queue, Queue::Slurm);
    // the default when no kpoints are given
    assert_eq!(config.kpoints, Kpoints::Mesh([1, 1, 1]));
}
