use std::{error::Error, fmt::Display, time::SystemTime};

use serde::{Deserialize, Serialize};

pub mod fireball;

#[derive(Debug, PartialEq, Eq)]
pub enum ProgramError {
    FileNotFound(String),
    ErrorInOutput(String),
    EnergyNotFound(String),
    EnergyParseError(String),
    ReadFileError(String, std::io::ErrorKind),
    WriteFileError(String, std::io::ErrorKind),
    /// the input failed validation before anything was written
    InvalidInput(String),
}

impl ProgramError {
    /// Returns `true` if the program error is [`ErrorInOutput`].
    ///
    /// [`ErrorInOutput`]: ProgramError::ErrorInOutput
    #[must_use]
    pub fn is_error_in_output(&self) -> bool {
        matches!(self, Self::ErrorInOutput(..))
    }

    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(..))
    }
}

impl Display for ProgramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for ProgramError {}

/// A trait for describing programs runnable on a [crate::queue::Queue]
pub trait Program {
    /// the file or directory associated with the program's input
    fn filename(&self) -> String;

    /// set `filename`
    fn set_filename(&mut self, filename: &str);

    /// the input file written by `write_input`
    fn infile(&self) -> String;

    /// the output file to parse when the job finishes
    fn outfile(&self) -> String;

    /// validate the input and write the input deck into `filename`. nothing
    /// may be written if validation fails
    fn write_input(&mut self) -> Result<(), ProgramError>;

    /// read and parse the output of a finished job
    fn read_output(filename: &str) -> Result<ProgramResult, ProgramError>;

    /// Return all the filenames associated with the Program for deletion
    /// when it finishes
    fn associated_files(&self) -> Vec<String>;
}

/// the scalar results every successful calculation must provide, plus the
/// optional markers found in the output
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramResult {
    pub energy: f64,
    pub time: f64,
    pub summary: fireball::Summary,
    /// (energy, T(E)) pairs when a transmission file was produced
    pub transmission: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone)]
pub struct Job<P: Program> {
    pub program: P,
    pub pbs_file: String,
    pub job_id: String,

    /// the index in the output array to store the result
    pub index: usize,

    /// the last modified time of `program`'s output file
    pub(crate) modtime: SystemTime,
}

impl<P: Program> Job<P> {
    pub fn new(program: P, index: usize) -> Self {
        Self {
            program,
            pbs_file: String::new(),
            job_id: String::new(),
            index,
            modtime: SystemTime::UNIX_EPOCH,
        }
    }

    /// return the current modtime of `self.program`'s output file, or
    /// `self.modtime` if there is an error accessing the metadata
    pub fn modtime(&self) -> SystemTime {
        let p = self.program.outfile();
        if let Ok(meta) = std::fs::metadata(p) {
            meta.modified().unwrap()
        } else {
            self.modtime
        }
    }
}

/// parses the `nth` field of `line` into a float and returns
/// [ProgramError::EnergyParseError] containing `outname` if it fails
#[inline]
fn parse_energy(
    line: &str,
    nth: usize,
    outname: &str,
) -> Result<Option<f64>, ProgramError> {
    line.split_whitespace()
        .nth(nth)
        .map(str::parse::<f64>)
        .transpose()
        .map_err(|_| ProgramError::EnergyParseError(outname.to_owned()))
}
