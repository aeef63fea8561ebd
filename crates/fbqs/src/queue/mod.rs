use std::{
    collections::{HashMap, HashSet},
    path::Path,
    process::Command,
    str,
    time::Duration,
};

use crate::{
    NO_RESUB, time,
    program::{Job, Program, ProgramResult},
};

mod drain;
pub mod local;
pub mod slurm;

pub trait Submit<P>: SubQueue<P>
where
    P: Program + Clone,
{
    /// submit `filename` to the queue and return the jobid
    fn submit(&self, filename: &str) -> String {
        loop {
            match Command::new(self.submit_command()).arg(filename).output() {
                Ok(s) => {
                    if s.status.success() {
                        let raw = str::from_utf8(&s.stdout)
                            .unwrap()
                            .trim()
                            .to_string();
                        return raw
                            .split_whitespace()
                            .last()
                            .unwrap_or("")
                            .to_string();
                    }
                    log::warn!(
                        "failed to submit {filename} with `{}`",
                        String::from_utf8_lossy(&s.stderr)
                    );
                    if *NO_RESUB {
                        std::process::exit(1);
                    }
                    std::thread::sleep(Duration::from_secs(1));
                }
                Err(e) => panic!("{e:?}"),
            };
        }
    }
}

/// a trait for all of the program-independent parts of a [Queue]
pub trait SubQueue<P>
where
    P: Program + Clone,
{
    /// the extension to append to submit scripts for this type of Queue
    const SCRIPT_EXT: &'static str;

    fn dir(&self) -> &str;

    fn submit_command(&self) -> &str;

    fn chunk_size(&self) -> usize;

    fn job_limit(&self) -> usize;

    fn sleep_int(&self) -> usize;

    /// the command to check the status of jobs in the queue
    fn stat_cmd(&self) -> String;

    /// return a HashSet of jobs found in the queue based on the output of
    /// `stat_cmd`
    fn status(&self) -> HashSet<String>;

    /// return `true` if all output files should be preserved
    fn no_del(&self) -> bool;
}

pub trait Queue<P>: SubQueue<P> + Submit<P>
where
    P: Program + Clone + Send + Sync,
{
    fn default_submit_script(&self) -> String;

    fn template(&self) -> &Option<String>;

    fn program_cmd(&self, filename: &str) -> String;

    fn write_submit_script(
        &self,
        jobdirs: impl IntoIterator<Item = String>,
        filename: &str,
    ) {
        use std::fmt::Write;
        let path = Path::new(filename);
        let basename = path.file_name().unwrap();
        let mut body = self
            .template()
            .clone()
            .unwrap_or_else(|| <Self as Queue<P>>::default_submit_script(self))
            .replace("{{.basename}}", basename.to_str().unwrap())
            .replace("{{.filename}}", filename);
        for dir in jobdirs {
            writeln!(body, "{}", self.program_cmd(&dir)).unwrap();
        }
        if std::fs::write(filename, body).is_err() {
            panic!("write_submit_script: failed to create {filename}");
        };
    }

    /// Build a chunk of jobs by writing the input decks and the corresponding
    /// submission script and then submitting the script. returns the total
    /// durations spent writing input files, writing the submit script, and
    /// submitting the script
    fn build_chunk(
        &self,
        dir: &str,
        jobs: &mut [Job<P>],
        chunk_num: usize,
    ) -> (HashMap<String, usize>, Duration, Duration, Duration) {
        let mut input = Duration::default();
        let mut script = Duration::default();
        let mut submit = Duration::default();
        let queue_file =
            format!("{}/main{}.{}", dir, chunk_num, Self::SCRIPT_EXT);
        let jl = jobs.len();
        let mut slurm_jobs = HashMap::new();
        let filenames = jobs.iter_mut().map(|job| {
            time!(e, {
                job.program.write_input().unwrap_or_else(|e| {
                    panic!(
                        "failed to write input in {} with {e}",
                        job.program.filename()
                    )
                });
            });
            input += e;
            job.pbs_file = queue_file.to_string();
            job.program.filename()
        });
        slurm_jobs.insert(queue_file.clone(), jl);
        time!(e, {
            self.write_submit_script(filenames, &queue_file);
        });
        script += e;
        // run jobs
        let job_id;
        time!(e, {
            job_id = self.submit(&queue_file);
        });
        submit += e;
        for job in jobs {
            job.job_id = job_id.clone();
        }
        (slurm_jobs, input, script, submit)
    }

    /// run the calculations in `jobs`, storing the results in `dst` by job
    /// index. returns the total job time as reported by `P::read_output` for
    /// the successful jobs along with the indices of any failed jobs
    fn drain(
        &self,
        dir: &str,
        jobs: Vec<Job<P>>,
        dst: &mut [Option<ProgramResult>],
    ) -> (f64, Vec<usize>)
    where
        Self: Sync,
    {
        drain::drain(self, dir, jobs, dst)
    }
}
