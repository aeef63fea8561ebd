//! settings for the conjugate-gradient optimizer, `cgopt.optional`

use serde::{Deserialize, Serialize};

/// step control and convergence thresholds for an in-program geometry
/// optimization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Cgopt {
    /// maximum displacement per step, in Angstroms
    pub drmax: f64,
    /// line-search mixing factor, strictly between 0 and 1
    pub dummy: f64,
    /// eV
    pub energy_tol: f64,
    /// eV/A
    pub force_tol: f64,
    pub max_steps: i64,
    pub min_int_steps: i64,
    /// hand off to molecular dynamics after this many steps, 0 to disable
    pub switch_md: i64,
}

impl Default for Cgopt {
    fn default() -> Self {
        Self {
            drmax: 0.1,
            dummy: 0.1,
            energy_tol: 1.0e-6,
            force_tol: 1.0e-4,
            max_steps: 1000,
            min_int_steps: 0,
            switch_md: 0,
        }
    }
}

impl Cgopt {
    pub fn validate(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if self.drmax <= 0.0 {
            messages.push(
                "invalid value for 'drmax' in the 'CGOPT' namelist. It must \
                 be greater than 0"
                    .to_string(),
            );
        }
        if self.dummy <= 0.0 || self.dummy >= 1.0 {
            messages.push(
                "invalid value for 'dummy' in the 'CGOPT' namelist. It must \
                 be between 0 and 1"
                    .to_string(),
            );
        }
        if self.energy_tol <= 0.0 {
            messages.push(
                "invalid value for 'energy_tol' in the 'CGOPT' namelist. It \
                 must be greater than 0"
                    .to_string(),
            );
        }
        if self.force_tol <= 0.0 {
            messages.push(
                "invalid value for 'force_tol' in the 'CGOPT' namelist. It \
                 must be greater than 0"
                    .to_string(),
            );
        }
        if self.max_steps < 1 {
            messages.push(
                "invalid value for 'max_steps' in the 'CGOPT' namelist. It \
                 must be greater than 0"
                    .to_string(),
            );
        }
        if self.min_int_steps < 0 {
            messages.push(
                "invalid value for 'min_int_steps' in the 'CGOPT' namelist. \
                 It must be greater than or equal to 0"
                    .to_string(),
            );
        }
        if self.switch_md < 0 {
            messages.push(
                "invalid value for 'switch_MD' in the 'CGOPT' namelist. It \
                 must be greater than or equal to 0"
                    .to_string(),
            );
        }
        messages
    }

    /// render the contents of `cgopt.optional`
    pub fn render(&self) -> String {
        use std::fmt::Write;
        let mut ret = String::new();
        writeln!(ret, "{:.6}\t{:.6}\t! drmax and dummy", self.drmax, self.dummy)
            .unwrap();
        writeln!(
            ret,
            "{:.6e}\t{:.6e}\t! Energy and force tolerance",
            self.energy_tol, self.force_tol
        )
        .unwrap();
        writeln!(ret, "{}\t! Maximum number of steps", self.max_steps)
            .unwrap();
        writeln!(
            ret,
            "{}\t! Minimum number of internal steps",
            self.min_int_steps
        )
        .unwrap();
        writeln!(ret, "{}\t! switch_MD", self.switch_md).unwrap();
        ret
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn defaults_pass() {
        assert!(Cgopt::default().validate().is_empty());
    }

    #[test_case(Cgopt { drmax: 0.0, ..Cgopt::default() }, "drmax"; "zero step")]
    #[test_case(Cgopt { dummy: 1.0, ..Cgopt::default() }, "dummy"; "mixing factor at one")]
    #[test_case(Cgopt { energy_tol: -1e-6, ..Cgopt::default() }, "energy_tol"; "negative energy tol")]
    #[test_case(Cgopt { force_tol: 0.0, ..Cgopt::default() }, "force_tol"; "zero force tol")]
    #[test_case(Cgopt { max_steps: 0, ..Cgopt::default() }, "max_steps"; "no steps")]
    #[test_case(Cgopt { min_int_steps: -1, ..Cgopt::default() }, "min_int_steps"; "negative internal steps")]
    #[test_case(Cgopt { switch_md: -1, ..Cgopt::default() }, "switch_MD"; "negative md switch")]
    fn out_of_range(cgopt: Cgopt, key: &str) {
        let messages = cgopt.validate();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains(key));
    }

    #[test]
    fn render_defaults() {
        let got = Cgopt::default().render();
        let want = "0.100000\t0.100000\t! drmax and dummy
1.000000e-6\t1.000000e-4\t! Energy and force tolerance
1000\t! Maximum number of steps
0\t! Minimum number of internal steps
0\t! switch_MD
";
        assert_eq!(got, want);
    }
}
