//! fan a Fireball single point out over a set of scaled cells and fit the
//! resulting E(V) curve to the Birch-Murnaghan equation of state

use std::fmt::Display;

use birch::{Birch, EosFit, FitError};
use fbqs::{
    params::Value,
    program::{Job, fireball::Fireball},
    queue::Queue,
};
use serde::Serialize;

use crate::config::Config;

pub mod config;

#[macro_export]
macro_rules! die {
    ($($t:tt)*) => {{
        eprintln!($($t)*);
        std::process::exit(1)
    }};
}

/// one finished point of the volume scan
#[derive(Clone, Debug, Serialize)]
pub struct EosPoint {
    pub scale: f64,
    /// A^3
    pub volume: f64,
    /// eV
    pub energy: f64,
}

#[derive(Debug, Serialize)]
pub struct EosReport {
    pub points: Vec<EosPoint>,
    /// indices into the scale factor list of jobs that never produced a
    /// usable result
    pub failed: Vec<usize>,
    pub fit: EosFit,
    /// total wall time spent in the sub-calculations, in seconds
    pub job_time: f64,
}

impl Display for EosReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:>8} {:>16} {:>20}", "scale", "volume", "energy")?;
        for p in &self.points {
            writeln!(
                f,
                "{:8.4} {:16.8} {:20.10}",
                p.scale, p.volume, p.energy
            )?;
        }
        if !self.failed.is_empty() {
            writeln!(f, "failed points: {:?}", self.failed)?;
        }
        writeln!(f, "{}", self.fit)?;
        write!(f, "job time: {:.1} s", self.job_time)
    }
}

/// run one single-point Fireball calculation per scale factor and fit the
/// surviving (volume, energy) points. jobs that fail are dropped from the
/// fit; fewer than 4 survivors is a [FitError]
pub fn run<Q>(queue: &Q, config: &Config) -> Result<EosReport, FitError>
where
    Q: Queue<Fireball> + Sync,
{
    let mut params = config.params.clone();
    {
        // each scan point is a plain SCF run
        let option = params.entry("OPTION");
        option.entry("nstepi".to_string()).or_insert(Value::Int(1));
        option.entry("nstepf".to_string()).or_insert(Value::Int(1));
    }

    let dir = queue.dir();
    let _ = std::fs::create_dir(dir);

    let mut jobs = Vec::new();
    let mut volumes = Vec::new();
    for (i, &scale) in config.scale_factors.iter().enumerate() {
        let structure = config.structure.scale(scale, config.axes);
        volumes.push(structure.volume());
        let program = Fireball::new(
            format!("{dir}/scale.{i:02}"),
            params.clone(),
            structure,
            config.kpoints.clone(),
            config.fdata.clone(),
            config.settings.clone(),
        );
        jobs.push(Job::new(program, i));
    }

    let mut dst = vec![None; jobs.len()];
    let (job_time, failed) = queue.drain(dir, jobs, &mut dst);
    if !failed.is_empty() {
        log::warn!("{} of the scan points failed", failed.len());
    }

    let mut points = Vec::new();
    for (i, res) in dst.into_iter().enumerate() {
        let Some(res) = res else {
            continue;
        };
        points.push(EosPoint {
            scale: config.scale_factors[i],
            volume: volumes[i],
            energy: res.energy,
        });
    }

    let pairs: Vec<_> =
        points.iter().map(|p| (p.volume, p.energy)).collect();
    let fit = Birch::new(&pairs)?.fit()?;

    Ok(EosReport {
        points,
        failed,
        fit,
        job_time,
    })
}
