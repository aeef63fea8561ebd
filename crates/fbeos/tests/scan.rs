//! volume-scan workflow tests against a shell script standing in for the
//! Fireball executable

use std::{os::unix::fs::PermissionsExt, path::Path};

use approx::assert_abs_diff_eq;
use fbeos::{config::Config, run};
use fbqs::{
    kpoints::Kpoints,
    params::Namelists,
    program::fireball::Settings,
    queue::local::Local,
    structure::{Atom, Structure},
};
use tempfile::tempdir;

/// evaluate the Birch-Murnaghan energy at E0 = -100, V0 = 27, B0 = 0.5,
/// B0' = 4 for the volume of the cubic cell in fireball.lvs
const EVAL: &str = r#"a=$(awk 'NR == 1 { gsub(/d/, "e", $1); print $1 }' fireball.lvs)
awk -v a="$a" 'BEGIN {
    v = a^3
    e0 = -100.0; v0 = 27.0; b0 = 0.5; bp = 4.0
    y = (v0 / v)^(2.0 / 3.0)
    x = y - 1.0
    printf "ETOT = %.8f\n", e0 + 9.0 * v0 * b0 / 16.0 * (x^3 * bp + x^2 * (6.0 - 4.0 * y))
    print " FIREBALL RUNTIME :     0.100000 [sec]"
}'
"#;

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

fn config(dir: &Path, scale_factors: Vec<f64>) -> Config {
    Config {
        structure: Structure::new(
            vec![Atom::new(14, 0.0, 0.0, 0.0)],
            [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]],
        ),
        params: Namelists::new(),
        kpoints: Kpoints::Mesh([1, 1, 1]),
        fdata: dir.join("Fdata").to_string_lossy().to_string(),
        scale_factors,
        axes: [true; 3],
        settings: Settings::default(),
        queue_template: None,
        queue: fbeos::config::Queue::Local,
        sleep_int: 1,
        job_limit: 128,
        chunk_size: 1,
    }
}

fn local(dir: &Path, script: &Path) -> Local {
    Local::new(
        1,
        128,
        1,
        dir.join("pts").to_str().unwrap(),
        false,
        Some(format!("FIREBALL_CMD={}\n", script.display())),
    )
}

#[test]
fn eos_scan() {
    let tmp = tempdir().unwrap();
    let script = tmp.path().join("fireball.sh");
    write_script(&script, EVAL);
    let config = config(tmp.path(), vec![0.94, 0.97, 1.0, 1.03, 1.06]);
    let report = run(&local(tmp.path(), &script), &config).unwrap();
    assert_eq!(report.points.len(), 5);
    assert!(report.failed.is_empty());
    assert!(report.job_time > 0.0);
    assert_abs_diff_eq!(report.fit.e0, -100.0, epsilon = 1e-4);
    assert_abs_diff_eq!(report.fit.v0, 27.0, epsilon = 1e-3);
    assert_abs_diff_eq!(report.fit.b0, 0.5, epsilon = 1e-3);
}

#[test]
fn failed_point_dropped() {
    let tmp = tempdir().unwrap();
    let script = tmp.path().join("fireball.sh");
    // the first scan point dies, the rest fit
    write_script(
        &script,
        &format!(
            "case \"$PWD\" in\n    *scale.00) echo ' ERROR in scf'; exit 0 ;;\nesac\n{EVAL}"
        ),
    );
    let config =
        config(tmp.path(), vec![0.92, 0.95, 0.98, 1.01, 1.04, 1.07]);
    let report = run(&local(tmp.path(), &script), &config).unwrap();
    assert_eq!(report.failed, vec![0]);
    assert_eq!(report.points.len(), 5);
    // the time of the surviving jobs is still reported
    assert!(report.job_time > 0.0);
    assert_abs_diff_eq!(report.fit.v0, 27.0, epsilon = 1e-3);
}

#[test]
fn too_many_failures() {
    let tmp = tempdir().unwrap();
    let script = tmp.path().join("fireball.sh");
    write_script(&script, "echo ' ERROR in scf'\n");
    let config = config(tmp.path(), vec![0.94, 0.97, 1.0, 1.03, 1.06]);
    let err = run(&local(tmp.path(), &script), &config).unwrap_err();
    assert!(err.0.contains("at least 4"));
}
