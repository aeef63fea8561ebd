use std::{
    fs::read_to_string,
    path::Path,
    sync::OnceLock,
};

use log::trace;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    cgopt::Cgopt,
    dos::Dos,
    kpoints::Kpoints,
    params::{fortran_float, Namelists, Value},
    structure::Structure,
    transport::Transport,
};

use super::{parse_energy, Program, ProgramError, ProgramResult};

#[cfg(test)]
mod tests;

static OUTPUT_CELL: OnceLock<[Regex; 11]> = OnceLock::new();

const INPUT_FILE: &str = "fireball.in";
const OUTPUT_FILE: &str = "fireball.out";
const BAS_FILE: &str = "fireball.bas";
const LVS_FILE: &str = "fireball.lvs";
const KPTS_FILE: &str = "fireball.kpts";
const CRASH_FILE: &str = "CRASH";
const FDATA_DIR: &str = "Fdata";
const TRANSMISSION_FILE: &str = "transmission.dat";

/// how the atomic charges were partitioned, from `iqout` in the output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeType {
    Lowdin,
    Mulliken,
    Natural,
}

/// the optional markers scraped from the Fireball stdout, beyond the energy
/// and runtime every successful run must report
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// eV
    pub fermi_energy: Option<f64>,
    pub number_of_electrons: Option<f64>,
    /// eV
    pub energy_tolerance: Option<f64>,
    /// eV/A
    pub force_tolerance: Option<f64>,
    pub sigma_tolerance: Option<f64>,
    pub beta_mixing: Option<f64>,
    pub charge_state: Option<f64>,
    pub charge_type: Option<ChargeType>,
}

/// per-job extras beyond the parameter namelists: geometry constraints, the
/// DOS, transport, and CG-optimizer optional files, and restart staging
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// one `[x, y, z]` flag triple per atom, `true` to freeze that component
    pub fixed_coords: Option<Vec<[bool; 3]>>,
    pub dos: Option<Dos>,
    pub transport: Option<Transport>,
    pub cgopt: Option<Cgopt>,
    /// shifts the DOS energy window to absolute energies, usually taken from
    /// the parent calculation
    pub fermi_energy: f64,
    /// a finished job directory to stage CHARGES and restart files from
    pub restart_from: Option<String>,
    /// symlink the restart files instead of copying them
    pub restart_symlink: bool,
}

impl Settings {
    fn validate(&self, natoms: usize) -> Vec<String> {
        let mut messages = Vec::new();
        if let Some(fixed) = &self.fixed_coords
            && fixed.len() != natoms
        {
            messages.push(format!(
                "input structure has {natoms} sites, but fixed_coords has \
                 length {}",
                fixed.len()
            ));
        }
        if let Some(dos) = &self.dos {
            messages.extend(dos.validate(natoms));
        }
        if let Some(transport) = &self.transport {
            messages.extend(transport.validate(natoms));
        }
        if let Some(cgopt) = &self.cgopt {
            messages.extend(cgopt.validate());
        }
        messages
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fireball {
    /// a directory name, not a file. Fireball reads its input from the fixed
    /// name `fireball.in` in the working directory
    filename: String,
    params: Namelists,
    structure: Structure,
    kpoints: Kpoints,
    /// path to the Fdata directory, symlinked into the job directory
    fdata: String,
    settings: Settings,
}

impl Fireball {
    pub fn new(
        filename: String,
        params: Namelists,
        structure: Structure,
        kpoints: Kpoints,
        fdata: String,
        settings: Settings,
    ) -> Self {
        Self {
            filename,
            params,
            structure,
            kpoints,
            fdata,
            settings,
        }
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// the deck builder owns the companion filenames and the verbosity
    fn blocked() -> Namelists {
        let mut ret = Namelists::new();
        ret.insert("OPTION", "basisfile", Value::Str(BAS_FILE.into()));
        ret.insert("OPTION", "lvsfile", Value::Str(LVS_FILE.into()));
        ret.insert("OPTION", "kptpreference", Value::Str(KPTS_FILE.into()));
        ret.insert("OPTION", "verbosity", Value::Int(3));
        ret
    }

    /// the final parameter set: user namelists merged with the blocked
    /// keywords, plus the output switches implied by the settings
    fn full_params(&self) -> Result<Namelists, ProgramError> {
        let mut params = self
            .params
            .merged(&Self::blocked())
            .map_err(|e| ProgramError::InvalidInput(e.to_string()))?;
        if self.settings.dos.is_some() {
            params
                .entry("OUTPUT")
                .entry("iwrtdos".to_string())
                .or_insert(Value::Int(1));
        }
        if let Some(transport) = &self.settings.transport
            && transport.trans.is_some()
        {
            params
                .entry("OUTPUT")
                .entry("iwrttrans".to_string())
                .or_insert(Value::Int(1));
        }
        Ok(params)
    }

    fn bas_contents(&self) -> String {
        use std::fmt::Write;
        let mut ret = String::new();
        writeln!(ret, "\t{:3}", self.structure.natoms()).unwrap();
        for atom in &self.structure.atoms {
            writeln!(
                ret,
                "{:3} {} {} {}",
                atom.atomic_number,
                fortran_float(atom.x),
                fortran_float(atom.y),
                fortran_float(atom.z),
            )
            .unwrap();
        }
        ret
    }

    fn lvs_contents(&self) -> String {
        use std::fmt::Write;
        let mut ret = String::new();
        for row in &self.structure.cell {
            writeln!(
                ret,
                "{} {} {}",
                fortran_float(row[0]),
                fortran_float(row[1]),
                fortran_float(row[2]),
            )
            .unwrap();
        }
        ret
    }

    /// Fireball wants Cartesian k-points, so expand the fractional points
    /// against the reciprocal cell here
    fn kpts_contents(&self) -> String {
        use std::fmt::Write;
        let kpts = self.kpoints.cartesian(&self.structure);
        let mut ret = String::new();
        writeln!(ret, "\t{:5}", kpts.len()).unwrap();
        for ([x, y, z], weight) in kpts {
            writeln!(
                ret,
                "{} {} {}\t{weight:.10}",
                fortran_float(x),
                fortran_float(y),
                fortran_float(z),
            )
            .unwrap();
        }
        ret
    }

    fn fragments_contents(&self, fixed: &[[bool; 3]]) -> String {
        use std::fmt::Write;
        let mut ret = String::from("0\n1\n");
        writeln!(ret, "{:3}", self.structure.natoms()).unwrap();
        for (i, fix) in fixed.iter().enumerate() {
            writeln!(
                ret,
                "{:3} {:1} {:1} {:1}",
                i + 1,
                fix[0] as u8,
                fix[1] as u8,
                fix[2] as u8
            )
            .unwrap();
        }
        ret
    }

    /// stage CHARGES and restart files from a finished parent directory
    fn stage_restart(&self, dir: &Path) -> Result<(), ProgramError> {
        let Some(parent) = &self.settings.restart_from else {
            return Ok(());
        };
        let entries = std::fs::read_dir(parent).map_err(|e| {
            ProgramError::ReadFileError(parent.clone(), e.kind())
        })?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name != "CHARGES" && !name.contains("restart") {
                continue;
            }
            let dst = dir.join(name.as_ref());
            let res = if self.settings.restart_symlink {
                let _ = std::fs::remove_file(&dst);
                std::os::unix::fs::symlink(entry.path(), &dst)
            } else {
                std::fs::copy(entry.path(), &dst).map(|_| ())
            };
            res.map_err(|e| {
                ProgramError::WriteFileError(
                    dst.to_string_lossy().to_string(),
                    e.kind(),
                )
            })?;
        }
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ProgramError> {
    std::fs::write(path, contents).map_err(|e| {
        ProgramError::WriteFileError(
            path.to_string_lossy().to_string(),
            e.kind(),
        )
    })
}

fn capture(re: &Regex, haystack: &str) -> Option<f64> {
    re.captures(haystack)?.get(1)?.as_str().parse().ok()
}

impl Program for Fireball {
    fn filename(&self) -> String {
        self.filename.clone()
    }

    fn set_filename(&mut self, filename: &str) {
        self.filename = filename.into();
    }

    fn infile(&self) -> String {
        Path::new(&self.filename)
            .join(INPUT_FILE)
            .to_string_lossy()
            .to_string()
    }

    fn outfile(&self) -> String {
        Path::new(&self.filename)
            .join(OUTPUT_FILE)
            .to_string_lossy()
            .to_string()
    }

    fn write_input(&mut self) -> Result<(), ProgramError> {
        // validate everything before touching the filesystem
        let messages = self.settings.validate(self.structure.natoms());
        if !messages.is_empty() {
            return Err(ProgramError::InvalidInput(messages.join("; ")));
        }
        let params = self.full_params()?;

        let dir = Path::new(&self.filename).to_owned();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ProgramError::WriteFileError(self.filename.clone(), e.kind())
        })?;

        write_file(&dir.join(INPUT_FILE), &params.render())?;
        write_file(&dir.join(BAS_FILE), &self.bas_contents())?;
        write_file(&dir.join(LVS_FILE), &self.lvs_contents())?;
        write_file(&dir.join(KPTS_FILE), &self.kpts_contents())?;

        if let Some(fixed) = &self.settings.fixed_coords {
            write_file(
                &dir.join("FRAGMENTS"),
                &self.fragments_contents(fixed),
            )?;
        }
        if let Some(dos) = &self.settings.dos {
            write_file(
                &dir.join("dos.optional"),
                &dos.render(
                    self.structure.natoms(),
                    self.settings.fermi_energy,
                ),
            )?;
        }
        if let Some(transport) = &self.settings.transport {
            for (name, contents) in transport.files() {
                write_file(&dir.join(name), &contents)?;
            }
        }
        if let Some(cgopt) = &self.settings.cgopt {
            write_file(&dir.join("cgopt.optional"), &cgopt.render())?;
        }

        let fdata = dir.join(FDATA_DIR);
        if let Err(e) = std::os::unix::fs::symlink(&self.fdata, &fdata)
            && e.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(ProgramError::WriteFileError(
                fdata.to_string_lossy().to_string(),
                e.kind(),
            ));
        }

        self.stage_restart(&dir)
    }

    fn read_output(filename: &str) -> Result<ProgramResult, ProgramError> {
        let path = Path::new(filename);

        let outfile = path.join(OUTPUT_FILE);
        let outname = outfile.to_string_lossy().to_string();
        let Ok(contents) = read_to_string(&outfile) else {
            return Err(ProgramError::FileNotFound(outname));
        };

        let [error_re, time_re, etot_re, fermi_re, qztot_re, etol_re, ftol_re, sigma_re, bmix_re, qstate_re, iqout_re] =
            OUTPUT_CELL.get_or_init(|| {
                trace!("initializing fireball output regexes");
                [
                    Regex::new(r"\bERROR\b").unwrap(),
                    Regex::new(r"FIREBALL RUNTIME :\s*(\d+\.\d+)\s*\[sec\]")
                        .unwrap(),
                    Regex::new(r"ETOT =\s*([+-]?\d+\.\d+)").unwrap(),
                    Regex::new(r"Fermi Level =\s*([+-]?\d+\.\d+)").unwrap(),
                    Regex::new(r"qztot =\s*(\d+\.\d+)").unwrap(),
                    Regex::new(
                        r"energy tolerance =\s*(\d+\.\d+(E[+-]\d+)?)\s*\[eV\]",
                    )
                    .unwrap(),
                    Regex::new(
                        r"force tolerance =\s*(\d+\.\d+(E[+-]\d+)?)\s*\[eV/A\]",
                    )
                    .unwrap(),
                    Regex::new(r"sigmatol =\s*(\d+\.\d+(E[+-]\d+)?)").unwrap(),
                    Regex::new(r"bmix =\s*(\d+\.\d+(E[+-]\d+)?)").unwrap(),
                    Regex::new(r"qstate =\s*(\d+\.\d+(E[+-]\d+)?)").unwrap(),
                    Regex::new(r"iqout =\s*(\d)").unwrap(),
                ]
            });

        if path.join(CRASH_FILE).exists() || error_re.is_match(&contents) {
            return Err(ProgramError::ErrorInOutput(outname));
        }

        // ETOT is printed every SCF step, so take the last match
        let energy = etot_re
            .captures_iter(&contents)
            .last()
            .and_then(|c| c.get(1)?.as_str().parse().ok());

        // the runtime is the last thing printed. without it the run was
        // interrupted and the last ETOT may be mid-optimization
        let time = capture(time_re, &contents);

        let charge_type =
            iqout_re.captures(&contents).and_then(|c| {
                match c.get(1)?.as_str() {
                    "1" => Some(ChargeType::Lowdin),
                    "2" => Some(ChargeType::Mulliken),
                    "3" => Some(ChargeType::Natural),
                    _ => None,
                }
            });

        let summary = Summary {
            fermi_energy: capture(fermi_re, &contents),
            number_of_electrons: capture(qztot_re, &contents),
            energy_tolerance: capture(etol_re, &contents),
            force_tolerance: capture(ftol_re, &contents),
            sigma_tolerance: capture(sigma_re, &contents),
            beta_mixing: capture(bmix_re, &contents),
            charge_state: capture(qstate_re, &contents),
            charge_type,
        };

        let transmission = match read_to_string(path.join(TRANSMISSION_FILE))
        {
            Ok(s) => {
                let mut pairs = Vec::new();
                for line in s.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let e = parse_energy(line, 0, &outname)?;
                    let t = parse_energy(line, 1, &outname)?;
                    if let (Some(e), Some(t)) = (e, t) {
                        pairs.push([e, t]);
                    }
                }
                Some(pairs)
            }
            Err(_) => None,
        };

        let (Some(energy), Some(time)) = (energy, time) else {
            return Err(ProgramError::EnergyNotFound(outname));
        };

        Ok(ProgramResult {
            energy,
            time,
            summary,
            transmission,
        })
    }

    fn associated_files(&self) -> Vec<String> {
        vec![
            INPUT_FILE.to_owned(),
            OUTPUT_FILE.to_owned(),
            BAS_FILE.to_owned(),
            LVS_FILE.to_owned(),
            KPTS_FILE.to_owned(),
            "CHARGES".to_owned(),
            "answer.bas".to_owned(),
            "answer.xyz".to_owned(),
        ]
    }
}
