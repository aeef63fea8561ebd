//! settings for the `dos.optional` density-of-states file

use serde::{Deserialize, Serialize};

/// energy window and projection range for a DOS calculation. `emin`/`emax`
/// are in eV relative to the Fermi level; the shift to absolute energies
/// happens when the file is rendered. the output DOS file will contain
/// `n_energy_steps` + 1 energy points
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Dos {
    pub first_atom_index: i64,
    /// defaults to the number of atoms in the structure
    pub last_atom_index: Option<i64>,
    pub emin: f64,
    pub emax: f64,
    pub n_energy_steps: i64,
    pub eta: f64,
    /// 1 writes the file tip_e_str.inp
    pub iwrttip: i64,
    pub emin_tip: f64,
    pub emax_tip: f64,
}

impl Default for Dos {
    fn default() -> Self {
        Self {
            first_atom_index: 1,
            last_atom_index: None,
            emin: -5.0,
            emax: 5.0,
            n_energy_steps: 100,
            eta: 0.1,
            iwrttip: 0,
            emin_tip: 0.0,
            emax_tip: 0.0,
        }
    }
}

impl Dos {
    fn last_atom_index(&self, natoms: usize) -> i64 {
        self.last_atom_index.unwrap_or(natoms as i64)
    }

    pub fn validate(&self, natoms: usize) -> Vec<String> {
        let mut messages = Vec::new();
        let n = natoms as i64;
        let last = self.last_atom_index(natoms);
        if self.first_atom_index < 1 || self.first_atom_index > n {
            messages.push(format!(
                "invalid value for 'first_atom_index' in the 'DOS' \
                 namelist. It must be between 1 and {n}"
            ));
        }
        if last < 1 || last > n || last < self.first_atom_index {
            messages.push(format!(
                "invalid value for 'last_atom_index' in the 'DOS' namelist. \
                 It must be between 1 and {n} and greater than \
                 'first_atom_index'"
            ));
        }
        if self.n_energy_steps < 1 {
            messages.push(
                "invalid value for 'n_energy_steps' in the 'DOS' namelist. \
                 It must be greater than 0"
                    .to_string(),
            );
        }
        if self.eta <= 0.0 {
            messages.push(
                "invalid value for 'eta' in the 'DOS' namelist. It must be \
                 greater than 0"
                    .to_string(),
            );
        }
        if !(self.iwrttip == 0 || self.iwrttip == 1) {
            messages.push(
                "invalid value for 'iwrttip' in the 'DOS' namelist. It must \
                 be either 0 or 1"
                    .to_string(),
            );
        }
        if self.emin_tip > self.emax_tip {
            messages.push(
                "'Emin_tip' must be less than 'Emax_tip' in the 'DOS' \
                 namelist"
                    .to_string(),
            );
        }
        if self.emin > self.emax {
            messages.push(
                "'Emin' must be less than 'Emax' in the 'DOS' namelist"
                    .to_string(),
            );
        }
        messages
    }

    /// render the contents of `dos.optional`, shifting the energy window by
    /// `fermi_energy`
    pub fn render(&self, natoms: usize, fermi_energy: f64) -> String {
        use std::fmt::Write;
        let mut ret = String::new();
        writeln!(ret, "1.0").unwrap();
        writeln!(
            ret,
            "{:3}\t{:3}\t! First and last atom index",
            self.first_atom_index,
            self.last_atom_index(natoms),
        )
        .unwrap();
        writeln!(ret, "{}\t! Number of energy steps", self.n_energy_steps)
            .unwrap();
        writeln!(
            ret,
            "{:.6}\t{}\t! Emin and dE",
            self.emin + fermi_energy,
            (self.emax - self.emin) / self.n_energy_steps as f64,
        )
        .unwrap();
        writeln!(
            ret,
            "{:1}\t! iwrttip=1 writes the file tip_e_str.inp",
            self.iwrttip
        )
        .unwrap();
        writeln!(
            ret,
            "{:.6}\t{:.6}\t! Emin_tip and Emax_tip",
            self.emin_tip, self.emax_tip
        )
        .unwrap();
        writeln!(ret, "{:.6}\t! eta", self.eta).unwrap();
        ret
    }
}
