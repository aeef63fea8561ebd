use approx::assert_abs_diff_eq;
use tempfile::tempdir;

use crate::structure::Atom;

use super::*;

fn diatomic() -> Structure {
    Structure::new(
        vec![
            Atom::new(14, 0.0, 0.0, 0.0),
            Atom::new(14, 1.3575, 1.3575, 1.3575),
        ],
        [[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]],
    )
}

fn params() -> Namelists {
    let mut p = Namelists::new();
    p.insert("OPTION", "nstepi", Value::Int(1));
    p.insert("OPTION", "nstepf", Value::Int(1));
    p.insert("OPTION", "iquench", Value::Int(-1));
    p
}

fn fireball(dir: &Path) -> Fireball {
    Fireball::new(
        dir.to_string_lossy().to_string(),
        params(),
        diatomic(),
        Kpoints::Mesh([1, 1, 1]),
        "/opt/fireball/Fdata".to_owned(),
        Settings::default(),
    )
}

#[test]
fn write_full_deck() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("job.0000");
    let mut fb = fireball(&dir);
    fb.settings.fixed_coords =
        Some(vec![[true, true, true], [false, false, true]]);
    fb.settings.dos = Some(Dos::default());
    fb.write_input().unwrap();

    let input = read_to_string(dir.join("fireball.in")).unwrap();
    let want = "\
&OPTION
  basisfile = 'fireball.bas'
  iquench = -1
  kptpreference = 'fireball.kpts'
  lvsfile = 'fireball.lvs'
  nstepf = 1
  nstepi = 1
  verbosity = 3
&END
&OUTPUT
  iwrtdos = 1
&END
";
    assert_eq!(input, want);

    let bas = read_to_string(dir.join("fireball.bas")).unwrap();
    let want = "\t  2
 14   0.0000000000d+00   0.0000000000d+00   0.0000000000d+00
 14   1.3575000000d+00   1.3575000000d+00   1.3575000000d+00
";
    assert_eq!(bas, want);

    let lvs = read_to_string(dir.join("fireball.lvs")).unwrap();
    assert_eq!(
        lvs.lines().next().unwrap(),
        "  5.4300000000d+00   0.0000000000d+00   0.0000000000d+00"
    );

    let kpts = read_to_string(dir.join("fireball.kpts")).unwrap();
    let want = "\t    1
  0.0000000000d+00   0.0000000000d+00   0.0000000000d+00\t1.0000000000
";
    assert_eq!(kpts, want);

    let fragments = read_to_string(dir.join("FRAGMENTS")).unwrap();
    let want = "0
1
  2
  1 1 1 1
  2 0 0 1
";
    assert_eq!(fragments, want);

    assert!(dir.join("dos.optional").exists());
    assert!(dir.join("Fdata").is_symlink());
}

#[test]
fn validation_before_write() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("job.0000");
    let mut fb = fireball(&dir);
    fb.settings.fixed_coords = Some(vec![[true, true, true]]);
    let err = fb.write_input().unwrap_err();
    assert!(err.is_invalid_input());
    // nothing may be written when validation fails
    assert!(!dir.exists());
}

#[test]
fn blocked_keyword_rejected() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("job.0000");
    let mut fb = fireball(&dir);
    fb.params
        .insert("OPTION", "basisfile", Value::Str("my.bas".into()));
    let err = fb.write_input().unwrap_err();
    assert!(err.is_invalid_input());
    assert!(!dir.exists());
}

#[test]
fn cgopt_file_written() {
    use crate::cgopt::Cgopt;
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("job.0000");
    let mut fb = fireball(&dir);
    fb.settings.cgopt = Some(Cgopt::default());
    fb.write_input().unwrap();
    assert!(dir.join("cgopt.optional").exists());

    let mut fb = fireball(&tmp.path().join("job.0001"));
    fb.settings.cgopt = Some(Cgopt {
        dummy: 1.5,
        ..Cgopt::default()
    });
    let err = fb.write_input().unwrap_err();
    assert!(err.is_invalid_input());
    assert!(!tmp.path().join("job.0001").exists());
}

#[test]
fn bad_transport_interval_writes_nothing() {
    use crate::transport::{Interaction, Interval, Trans};
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("job.0000");
    let mut fb = fireball(&dir);
    fb.settings.transport = Some(Transport {
        trans: Some(Trans::default()),
        interaction: Some(Interaction {
            ncell1: 1,
            interval1: Interval { first: 0, last: 4 },
            ncell2: 1,
            interval2: Interval { first: 1, last: 2 },
        }),
        ..Transport::default()
    });
    let err = fb.write_input().unwrap_err();
    assert!(err.is_invalid_input());
    assert!(!dir.exists());
}

#[test]
fn transport_files_written() {
    use crate::transport::{Interaction, Interval, Trans};
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("job.0000");
    let mut fb = fireball(&dir);
    fb.settings.transport = Some(Transport {
        trans: Some(Trans::default()),
        interaction: Some(Interaction {
            ncell1: 1,
            interval1: Interval { first: 1, last: 1 },
            ncell2: 1,
            interval2: Interval { first: 2, last: 2 },
        }),
        ..Transport::default()
    });
    fb.write_input().unwrap();
    assert!(dir.join("trans.optional").exists());
    assert!(dir.join("interaction.optional").exists());
    let input = read_to_string(dir.join("fireball.in")).unwrap();
    assert!(input.contains("iwrttrans = 1"));
}

const STDOUT: &str = "
 Fireball RUNNING
 iqout = 2
 qstate =  0.00
 bmix =  0.0400
 sigmatol =  1.000E-08
 energy tolerance =  0.0000100000 [eV]
 force tolerance =  0.0000500000 [eV/A]
 qztot =  8.00
ETOT =     -120.000001
ETOT =     -123.456000
 Fermi Level =   -4.562300
 FIREBALL RUNTIME :     12.340000 [sec]
";

#[test]
fn read_output_markers() {
    let tmp = tempdir().unwrap();
    std::fs::write(tmp.path().join("fireball.out"), STDOUT).unwrap();
    let got =
        Fireball::read_output(tmp.path().to_str().unwrap()).unwrap();
    assert_abs_diff_eq!(got.energy, -123.456, epsilon = 1e-12);
    assert_abs_diff_eq!(got.time, 12.34, epsilon = 1e-12);
    let summary = got.summary;
    assert_abs_diff_eq!(
        summary.fermi_energy.unwrap(),
        -4.5623,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(
        summary.number_of_electrons.unwrap(),
        8.0,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(
        summary.energy_tolerance.unwrap(),
        1e-5,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(
        summary.sigma_tolerance.unwrap(),
        1e-8,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(
        summary.beta_mixing.unwrap(),
        0.04,
        epsilon = 1e-12
    );
    assert_eq!(summary.charge_type, Some(ChargeType::Mulliken));
    assert!(got.transmission.is_none());
}

#[test]
fn missing_runtime_is_an_error() {
    let tmp = tempdir().unwrap();
    let truncated: String = STDOUT
        .lines()
        .filter(|l| !l.contains("RUNTIME"))
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(tmp.path().join("fireball.out"), truncated).unwrap();
    let err =
        Fireball::read_output(tmp.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, ProgramError::EnergyNotFound(_)));
}

#[test]
fn error_in_output() {
    let tmp = tempdir().unwrap();
    std::fs::write(tmp.path().join("fireball.out"), "fatal ERROR in scf\n")
        .unwrap();
    let err =
        Fireball::read_output(tmp.path().to_str().unwrap()).unwrap_err();
    assert!(err.is_error_in_output());
}

#[test]
fn crash_file() {
    let tmp = tempdir().unwrap();
    std::fs::write(tmp.path().join("fireball.out"), STDOUT).unwrap();
    std::fs::write(tmp.path().join("CRASH"), "").unwrap();
    let err =
        Fireball::read_output(tmp.path().to_str().unwrap()).unwrap_err();
    assert!(err.is_error_in_output());
}

#[test]
fn missing_output_file() {
    let tmp = tempdir().unwrap();
    let err =
        Fireball::read_output(tmp.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, ProgramError::FileNotFound(_)));
}

#[test]
fn transmission_parsed() {
    let tmp = tempdir().unwrap();
    std::fs::write(tmp.path().join("fireball.out"), STDOUT).unwrap();
    std::fs::write(
        tmp.path().join("transmission.dat"),
        "# E T\n-5.0 0.95\n-4.5 0.80\n",
    )
    .unwrap();
    let got =
        Fireball::read_output(tmp.path().to_str().unwrap()).unwrap();
    let trans = got.transmission.unwrap();
    assert_eq!(trans.len(), 2);
    assert_abs_diff_eq!(trans[0][0], -5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(trans[1][1], 0.8, epsilon = 1e-12);
}

#[test]
fn restart_staging() {
    let tmp = tempdir().unwrap();
    let parent = tmp.path().join("job.0000");
    std::fs::create_dir(&parent).unwrap();
    std::fs::write(parent.join("CHARGES"), "1.0 2.0\n").unwrap();
    std::fs::write(parent.join("wf.restart"), "").unwrap();
    std::fs::write(parent.join("fireball.out"), "").unwrap();

    let dir = tmp.path().join("job.0001");
    let mut fb = fireball(&dir);
    fb.settings.restart_from =
        Some(parent.to_string_lossy().to_string());
    fb.write_input().unwrap();

    assert!(dir.join("CHARGES").exists());
    assert!(dir.join("wf.restart").exists());
    assert!(!dir.join("fireball.out").exists());
}
