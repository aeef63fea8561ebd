//! settings for the quantum-transport `*.optional` files
//!
//! A transport run describes two electrode samples coupled through the
//! device region. Each sub-block is optional and maps to one file in the
//! job directory: `trans.optional`, `interaction.optional`, `eta.optional`,
//! and `bias.optional`. Atom intervals are 1-based and inclusive, matching
//! the Fortran indexing in the output.

use serde::{Deserialize, Serialize};

/// a 1-based, inclusive range of atom indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub first: i64,
    pub last: i64,
}

impl Interval {
    fn validate(&self, natoms: usize, block: &str) -> Vec<String> {
        let mut messages = Vec::new();
        let n = natoms as i64;
        if self.first < 1 || self.first > n {
            messages.push(format!(
                "invalid atom interval start {} in the '{block}' block. It \
                 must be between 1 and {n}",
                self.first
            ));
        }
        if self.last < 1 || self.last > n || self.last < self.first {
            messages.push(format!(
                "invalid atom interval end {} in the '{block}' block. It \
                 must be between 1 and {n} and not less than the start",
                self.last
            ));
        }
        messages
    }
}

/// transmission-window settings for `trans.optional`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Trans {
    pub ieta: i64,
    pub iwrt_trans: i64,
    pub ichannel: i64,
    pub ifithop: i64,
    pub emin: f64,
    pub emax: f64,
    pub n_energy_steps: i64,
    pub eta: f64,
}

impl Default for Trans {
    fn default() -> Self {
        Self {
            ieta: 1,
            iwrt_trans: 1,
            ichannel: 0,
            ifithop: 1,
            emin: -5.0,
            emax: 5.0,
            n_energy_steps: 500,
            eta: 1.0e-4,
        }
    }
}

impl Trans {
    fn validate(&self) -> Vec<String> {
        let mut messages = Vec::new();
        for (key, val) in [
            ("ieta", self.ieta),
            ("iwrt_trans", self.iwrt_trans),
            ("ichannel", self.ichannel),
            ("ifithop", self.ifithop),
        ] {
            if !(val == 0 || val == 1) {
                messages.push(format!(
                    "invalid value for '{key}' in the 'TRANS' block. It \
                     must be either 0 or 1"
                ));
            }
        }
        if self.n_energy_steps < 1 {
            messages.push(
                "invalid value for 'n_energy_steps' in the 'TRANS' block. \
                 It must be greater than 0"
                    .to_string(),
            );
        }
        if self.eta <= 0.0 {
            messages.push(
                "invalid value for 'eta' in the 'TRANS' block. It must be \
                 greater than 0"
                    .to_string(),
            );
        }
        if self.emin > self.emax {
            messages.push(
                "'Emin' must be less than 'Emax' in the 'TRANS' block"
                    .to_string(),
            );
        }
        messages
    }

    fn render(&self) -> String {
        use std::fmt::Write;
        let mut ret = String::new();
        writeln!(
            ret,
            "{}\t{}\t{}\t{}\t! ieta iwrt_trans ichannel ifithop",
            self.ieta, self.iwrt_trans, self.ichannel, self.ifithop
        )
        .unwrap();
        writeln!(ret, "{}\t! Number of energy steps", self.n_energy_steps)
            .unwrap();
        writeln!(ret, "{:.6}\t{:.6}\t! Emin and Emax", self.emin, self.emax)
            .unwrap();
        writeln!(ret, "{:.6e}\t! eta", self.eta).unwrap();
        ret
    }
}

/// electrode geometry for `interaction.optional`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Interaction {
    pub ncell1: i64,
    pub interval1: Interval,
    pub ncell2: i64,
    pub interval2: Interval,
}

impl Interaction {
    fn validate(&self, natoms: usize) -> Vec<String> {
        let mut messages = Vec::new();
        for (key, val) in [("ncell1", self.ncell1), ("ncell2", self.ncell2)]
        {
            if val < 1 {
                messages.push(format!(
                    "invalid value for '{key}' in the 'INTERACTION' block. \
                     It must be greater than 0"
                ));
            }
        }
        messages.extend(self.interval1.validate(natoms, "INTERACTION"));
        messages.extend(self.interval2.validate(natoms, "INTERACTION"));
        messages
    }

    fn render(&self) -> String {
        use std::fmt::Write;
        let mut ret = String::new();
        writeln!(ret, "{:3}\t! Number of cells sample 1", self.ncell1)
            .unwrap();
        writeln!(
            ret,
            "{:3}\t{:3}\t! First and last atom index sample 1",
            self.interval1.first, self.interval1.last
        )
        .unwrap();
        writeln!(ret, "{:3}\t! Number of cells sample 2", self.ncell2)
            .unwrap();
        writeln!(
            ret,
            "{:3}\t{:3}\t! First and last atom index sample 2",
            self.interval2.first, self.interval2.last
        )
        .unwrap();
        ret
    }
}

/// imaginary broadening applied to the selected atom intervals,
/// `eta.optional`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Eta {
    pub intervals: Vec<Interval>,
    pub eta: f64,
}

impl Eta {
    fn validate(&self, natoms: usize) -> Vec<String> {
        let mut messages = Vec::new();
        if self.intervals.is_empty() {
            messages.push(
                "the 'ETA' block must contain at least one atom interval"
                    .to_string(),
            );
        }
        for interval in &self.intervals {
            messages.extend(interval.validate(natoms, "ETA"));
        }
        if self.eta <= 0.0 {
            messages.push(
                "invalid value for 'eta' in the 'ETA' block. It must be \
                 greater than 0"
                    .to_string(),
            );
        }
        messages
    }

    fn render(&self) -> String {
        use std::fmt::Write;
        let mut ret = String::new();
        writeln!(ret, "{}\t! Number of intervals", self.intervals.len())
            .unwrap();
        for interval in &self.intervals {
            writeln!(ret, "{:3}\t{:3}", interval.first, interval.last)
                .unwrap();
        }
        writeln!(ret, "{:.6e}\t! eta", self.eta).unwrap();
        ret
    }
}

/// applied bias window for `bias.optional`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bias {
    pub bias: f64,
    pub z_top: f64,
    pub z_bottom: f64,
}

impl Bias {
    fn validate(&self) -> Vec<String> {
        if self.z_bottom > self.z_top {
            vec![
                "'z_bottom' must be less than 'z_top' in the 'BIAS' block"
                    .to_string(),
            ]
        } else {
            Vec::new()
        }
    }

    fn render(&self) -> String {
        use std::fmt::Write;
        let mut ret = String::new();
        writeln!(ret, "{:.6}\t! Bias voltage", self.bias).unwrap();
        writeln!(
            ret,
            "{:.6}\t{:.6}\t! z_top and z_bottom",
            self.z_top, self.z_bottom
        )
        .unwrap();
        ret
    }
}

/// the full transport configuration. every block is optional, but `trans`
/// requires `interaction` to define the electrodes it couples
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Transport {
    pub trans: Option<Trans>,
    pub interaction: Option<Interaction>,
    pub eta: Option<Eta>,
    pub bias: Option<Bias>,
}

impl Transport {
    pub fn validate(&self, natoms: usize) -> Vec<String> {
        let mut messages = Vec::new();
        if self.trans.is_some() && self.interaction.is_none() {
            messages.push(
                "the 'TRANS' block requires an 'INTERACTION' block to \
                 define the electrodes"
                    .to_string(),
            );
        }
        if let Some(trans) = &self.trans {
            messages.extend(trans.validate());
        }
        if let Some(interaction) = &self.interaction {
            messages.extend(interaction.validate(natoms));
        }
        if let Some(eta) = &self.eta {
            messages.extend(eta.validate(natoms));
        }
        if let Some(bias) = &self.bias {
            messages.extend(bias.validate());
        }
        messages
    }

    /// the optional files to write, as (filename, contents) pairs
    pub fn files(&self) -> Vec<(&'static str, String)> {
        let mut ret = Vec::new();
        if let Some(trans) = &self.trans {
            ret.push(("trans.optional", trans.render()));
        }
        if let Some(interaction) = &self.interaction {
            ret.push(("interaction.optional", interaction.render()));
        }
        if let Some(eta) = &self.eta {
            ret.push(("eta.optional", eta.render()));
        }
        if let Some(bias) = &self.bias {
            ret.push(("bias.optional", bias.render()));
        }
        ret
    }
}
