//! Configuration settings for running a volume scan

use std::{
    fmt::{Debug, Display},
    fs::read_to_string,
    path::Path,
};

use fbqs::{
    kpoints::Kpoints, params::Namelists, program::fireball::Settings,
    structure::Structure,
};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Templates can either be literal strings in the config file, or the name of a
/// file to be loaded
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(untagged)]
enum TemplateSrc {
    Literal(String),
    File { file: String },
}

impl From<TemplateSrc> for String {
    fn from(value: TemplateSrc) -> Self {
        match value {
            TemplateSrc::Literal(s) => s,
            TemplateSrc::File { file } => {
                read_to_string(&file).unwrap_or_else(|_| {
                    panic!("failed to locate template file {file}")
                })
            }
        }
    }
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    /// The atoms of the unscaled structure, one per line: an element symbol
    /// or atomic number followed by Cartesian coordinates in Angstroms.
    geometry: String,

    /// The three lattice vectors of the unscaled cell, as rows, in
    /// Angstroms.
    cell: [[f64; 3]; 3],

    /// The Fireball input parameters, nested as namelist -> key -> value.
    /// nstepi and nstepf default to 1 so that each scan point is a plain
    /// SCF calculation.
    params: Namelists,

    /// The k-points to sample: either a uniform [n1, n2, n3] mesh or an
    /// explicit list of fractional points. Defaults to the Gamma point.
    kpoints: Option<Kpoints>,

    /// The directory holding the Fdata tables for the species involved.
    fdata: String,

    /// An explicit list of cell scale factors. Either this or scale_min,
    /// scale_max, and npoints must be given.
    scale_factors: Option<Vec<f64>>,

    /// The smallest scale factor of the scan.
    scale_min: Option<f64>,

    /// The largest scale factor of the scan.
    scale_max: Option<f64>,

    /// The number of evenly spaced scale factors between scale_min and
    /// scale_max, inclusive. The equation of state has four parameters, so
    /// at least 4 are required.
    npoints: Option<usize>,

    /// Which lattice vectors the scale factor applies to. Defaults to all
    /// three for a uniform volume scan.
    axes: Option<[bool; 3]>,

    /// Additional per-job settings: fixed coordinates, DOS, transport, and
    /// CG-optimizer blocks, restart staging.
    settings: Option<Settings>,

    /// The template input file for the queuing system. Supported formatting
    /// directives include {{.basename}} for the base name of the submit
    /// script and {{.filename}} for its full path.
    queue_template: Option<TemplateSrc>,

    /// The queuing system to use. Currently-supported values are "local",
    /// which uses bash to run computations directly, and "slurm".
    queue: Queue,

    /// The interval in seconds to wait between loops checking if any jobs
    /// have finished.
    sleep_int: usize,

    /// The maximum number of jobs to submit at once, as determined by the
    /// number of individual job directories. This distinction is important
    /// when chunk_size is greater than 1 because the maximum number of jobs
    /// submitted to the queue will be job_limit / chunk_size.
    job_limit: usize,

    /// The number of individual calculations to bundle into a single queue
    /// submission.
    chunk_size: usize,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Queue {
    #[serde(alias = "slurm")]
    Slurm,
    #[serde(alias = "local")]
    Local,
}

impl Display for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Queue::Slurm => "slurm",
                Queue::Local => "local",
            }
        )
    }
}

/// Construct a full `Config` using [Config::load] on a TOML file
#[derive(Clone, Deserialize, PartialEq, Debug)]
#[serde(from = "RawConfig")]
pub struct Config {
    /// the unscaled structure, assembled from the `geometry` and `cell`
    /// fields
    pub structure: Structure,

    /// the Fireball input parameters shared by every scan point
    pub params: Namelists,

    /// the k-points shared by every scan point
    pub kpoints: Kpoints,

    /// path to the Fdata directory
    pub fdata: String,

    /// the resolved scale factors, either the explicit list or npoints
    /// evenly spaced values over [scale_min, scale_max]
    pub scale_factors: Vec<f64>,

    /// which lattice vectors to scale
    pub axes: [bool; 3],

    /// per-job extras passed through to the deck builder
    pub settings: Settings,

    /// the optional template to use for the queuing system. If this is not
    /// provided, the queue's implementation of
    /// [fbqs::queue::Queue::default_submit_script] will be used
    pub queue_template: Option<String>,

    pub queue: Queue,

    /// how long to sleep between intervals polling running jobs
    pub sleep_int: usize,

    /// limit for the number of jobs to run at once
    pub job_limit: usize,

    /// the number of jobs to include in a single submit script
    pub chunk_size: usize,
}

impl From<RawConfig> for Config {
    fn from(rc: RawConfig) -> Self {
        let mut structure: Structure = rc.geometry.parse().unwrap();
        structure.cell = rc.cell;
        let scale_factors = match rc.scale_factors {
            Some(list) => list,
            None => {
                let (Some(lo), Some(hi), Some(n)) =
                    (rc.scale_min, rc.scale_max, rc.npoints)
                else {
                    panic!(
                        "either scale_factors or all of scale_min, \
                         scale_max, and npoints must be given"
                    );
                };
                linspace(lo, hi, n)
            }
        };
        Self {
            structure,
            params: rc.params,
            kpoints: rc.kpoints.unwrap_or_default(),
            fdata: rc.fdata,
            scale_factors,
            axes: rc.axes.unwrap_or([true; 3]),
            settings: rc.settings.unwrap_or_default(),
            queue_template: rc.queue_template.map(TemplateSrc::into),
            queue: rc.queue,
            sleep_int: rc.sleep_int,
            job_limit: rc.job_limit,
            chunk_size: rc.chunk_size,
        }
    }
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![lo];
    }
    let step = (hi - lo) / (n - 1) as f64;
    (0..n).map(|i| lo + i as f64 * step).collect()
}

impl Config {
    /// load a [Config] from the TOML file specified by `filename`. panics on
    /// failure to read the file and on failure to deserialize it.
    pub fn load<P>(filename: P) -> Self
    where
        P: AsRef<Path> + Debug,
    {
        let contents = std::fs::read_to_string(&filename)
            .expect("failed to load config file");
        let ret: Self = toml::from_str(&contents).unwrap_or_else(|e| {
            panic!("failed to deserialize config file '{filename:?}' with {e}")
        });

        ret.validate();

        ret
    }

    /// check that the settings in `self` make any sense
    fn validate(&self) {
        if self.job_limit < self.chunk_size {
            eprintln!(
                "In fbeos.toml: Your job_limit ({}) is TOO LOW. \
                 Must be greater than chunk_size ({}), exiting",
                self.job_limit, self.chunk_size
            );
            std::process::exit(1);
        }
        if self.scale_factors.len() < 4 {
            eprintln!(
                "In fbeos.toml: {} scale factors are TOO FEW to fit the \
                 four equation of state parameters. Need at least 4, exiting",
                self.scale_factors.len()
            );
            std::process::exit(1);
        }
        if self
            .scale_factors
            .iter()
            .any(|s| !s.is_finite() || *s <= 0.0)
        {
            eprintln!(
                "In fbeos.toml: scale factors must be positive, exiting"
            );
            std::process::exit(1);
        }
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Config {
            structure,
            params: _,
            kpoints: _,
            fdata,
            scale_factors,
            axes,
            settings: _,
            queue_template,
            queue,
            sleep_int,
            job_limit,
            chunk_size,
        } = self;
        write!(
            f,
            "
Configuration Options:
geometry = {{
{structure}}}
fdata = {fdata}
scale_factors = {scale_factors:?}
axes = {axes:?}
queue_template = {}
queue = {queue}
sleep_int = {sleep_int}
job_limit = {job_limit}
chunk_size = {chunk_size}
",
            queue_template.as_ref().unwrap_or(&String::new()),
        )
    }
}
