use std::{
    collections::{HashMap, HashSet},
    sync::{
        LazyLock,
        mpsc::{self, Sender, SyncSender},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use libc::{RUSAGE_SELF, timeval};

use crate::program::{Job, Program, ProgramResult};

use super::Queue;

static DUMP_DEBUG: LazyLock<bool> =
    LazyLock::new(|| std::env::var("DUMP_DEBUG").is_ok());

/// the number of times to re-check a job that has left the queue before
/// giving up on its output file appearing
const MAX_RETRIES: usize = 5;

/// a garbage heap that spawns another thread and sends filenames to be
/// deleted. the `None` variant is used when no_del is enabled to turn every
/// method into a no op
enum Dump {
    Real {
        handle: JoinHandle<()>,
        sender: Sender<String>,
        /// a sync channel for signalling that the thread should exit
        /// immediately
        signal: SyncSender<()>,
    },
    None,
}

#[inline]
fn nil_handler(_file: &str, _e: std::io::Result<()>) {}

#[inline]
fn debug_handler(file: &str, e: std::io::Result<()>) {
    if let Err(e) = e {
        eprintln!("failed to remove {file} with {e}");
    }
}

impl Dump {
    fn new(no_del: bool) -> Self {
        if no_del {
            return Self::None;
        }
        let (sender, receiver) = mpsc::channel::<String>();
        let (signal, exit) = mpsc::sync_channel(0);

        let err_handler = if *DUMP_DEBUG {
            debug_handler
        } else {
            nil_handler
        };

        let handle = thread::spawn(move || {
            for file in receiver {
                if exit.try_recv().is_ok() {
                    return;
                }
                err_handler(&file, std::fs::remove_file(&file));
            }
        });

        Self::Real {
            handle,
            sender,
            signal,
        }
    }

    fn send(&self, s: String) {
        match self {
            Dump::Real { sender, .. } => {
                sender.send(s).unwrap();
            }
            Dump::None => {}
        }
    }

    fn shutdown(self) {
        let Self::Real {
            handle,
            sender,
            signal,
        } = self
        else {
            return;
        };
        drop(sender);
        // it's okay for this to fail because it just means the receiving
        // thread exited first
        let _ = signal.send(());
        drop(signal);
        handle.join().unwrap();
    }
}

#[derive(Default)]
struct Timer {
    writing_input: Duration,
    writing_script: Duration,
    submitting_script: Duration,
    reading: Duration,
    sleeping: Duration,
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1} s reading, {:.1} s writing input, {:.1} s writing script, \
	     {:.1} s submitting, {:.1} s sleeping",
            self.reading.as_millis() as f64 / 1000.0,
            self.writing_input.as_millis() as f64 / 1000.0,
            self.writing_script.as_millis() as f64 / 1000.0,
            self.submitting_script.as_millis() as f64 / 1000.0,
            self.sleeping.as_millis() as f64 / 1000.0,
        )
    }
}

fn to_secs(time: timeval) -> f64 {
    time.tv_sec as f64 + time.tv_usec as f64 / 1e6
}

/// return the CPU time used by the current process in seconds
fn get_cpu_time() -> f64 {
    unsafe {
        let mut rusage = std::mem::MaybeUninit::uninit();
        let res = libc::getrusage(RUSAGE_SELF, rusage.as_mut_ptr());
        if res != 0 {
            return 0.0;
        }
        let rusage = rusage.assume_init();
        to_secs(rusage.ru_stime) + to_secs(rusage.ru_utime)
    }
}

fn wait<P, Q>(queue: &Q, time: &mut Timer, iter: usize, remaining: usize)
where
    P: Program + Clone + Send + Sync,
    Q: Queue<P> + ?Sized + Sync,
{
    let date = jiff::Zoned::now().strftime("%Y-%m-%d %H:%M:%S");
    eprintln!(
        "[iter {iter} {date} {:.1} CPU s] {remaining} jobs remaining",
        get_cpu_time()
    );
    let d = Duration::from_secs(queue.sleep_int() as u64);
    time.sleeping += d;
    thread::sleep(d);
}

/// submit `jobs` in chunks and poll their output files until every job has
/// either produced a parseable result or failed. a job whose id has left the
/// queue without output is re-checked `MAX_RETRIES` times before it counts
/// as failed. failed jobs are never resubmitted; the caller decides whether
/// the surviving results are enough. returns the total job time over the
/// successful jobs and the sorted indices of the failed ones
pub(crate) fn drain<P, Q>(
    queue: &Q,
    dir: &str,
    mut jobs: Vec<Job<P>>,
    dst: &mut [Option<ProgramResult>],
) -> (f64, Vec<usize>)
where
    P: Program + Clone + Send + Sync,
    Q: Queue<P> + ?Sized + Sync,
{
    use rayon::prelude::*;

    // total time for the jobs to run as returned from Program::read_output
    let mut job_time = 0.0;

    let mut cur_jobs: Vec<Job<P>> = Vec::new();
    let mut slurm_jobs = HashMap::new();
    let mut remaining = jobs.len();
    let total_jobs = jobs.len();

    let job_limit = queue.job_limit();
    let chunk_size = queue.chunk_size();

    let dump = Dump::new(queue.no_del());
    let mut time = Timer::default();

    let mut qstat = HashSet::<String>::new();
    let mut chunks =
        jobs.chunks_mut(chunk_size).enumerate().fuse().peekable();
    let mut out_of_jobs = false;
    let mut to_remove = Vec::new();
    let mut failed_jobs: Vec<usize> = Vec::new();
    let mut retries: HashMap<String, usize> = HashMap::new();
    let mut iter = 0;
    loop {
        if chunks.peek().is_none() {
            out_of_jobs = true;
        }
        if !out_of_jobs {
            let works: Vec<_> = (&mut chunks)
                .take((job_limit - cur_jobs.len()) / chunk_size)
                // NOTE par_bridge does NOT preserve order
                .par_bridge()
                .map(|(chunk_num, jobs)| {
                    let (sj, wi, ws, ss) =
                        queue.build_chunk(dir, jobs, chunk_num);
                    let job_id = jobs[0].job_id.clone();
                    (jobs.to_vec(), sj, job_id, wi, ws, ss)
                })
                .collect();
            log::trace!("received {} chunks of jobs", works.len());
            for (jobs, sj, job_id, wi, ws, ss) in works {
                slurm_jobs.extend(sj);
                time.writing_input += wi;
                time.writing_script += ws;
                time.submitting_script += ss;
                qstat.insert(job_id);
                cur_jobs.extend(jobs);
            }
        }

        // collect output
        let mut finished = 0;
        to_remove.clear();
        let now = std::time::Instant::now();
        let outfiles: Vec<_> =
            cur_jobs.iter().map(|job| job.program.filename()).collect();
        let results: Vec<_> =
            outfiles.par_iter().map(|out| P::read_output(out)).collect();
        time.reading += now.elapsed();
        for (i, (job, res)) in cur_jobs.iter_mut().zip(results).enumerate() {
            match res {
                Ok(res) => {
                    to_remove.push(i);
                    job_time += res.time;
                    dst[job.index] = Some(res);
                    for f in job.program.associated_files() {
                        dump.send(
                            format!("{}/{f}", job.program.filename()),
                        );
                    }
                    finished += 1;
                    remaining -= 1;
                    let job_name = job.pbs_file.as_str();
                    match slurm_jobs.get_mut(job_name) {
                        Some(count) => {
                            *count -= 1;
                            if *count == 0 {
                                // delete the submit script and its output
                                dump.send(job_name.to_string());
                                dump.send(format!("{job_name}.out"));
                            }
                        }
                        None => {
                            eprintln!(
                                "failed to find {job_name} in slurm_jobs"
                            );
                        }
                    }
                }
                Err(e) => {
                    if e.is_error_in_output() {
                        log::warn!(
                            "{} failed with `{e}`",
                            job.program.filename()
                        );
                        to_remove.push(i);
                        failed_jobs.push(job.index);
                        remaining -= 1;
                    } else if !qstat.contains(&job.job_id) {
                        // to avoid temporary file system issues, check a few
                        // times before giving up on the output appearing
                        let retry = retries
                            .entry(job.program.filename())
                            .or_insert(MAX_RETRIES);
                        if *retry == 0 {
                            let time = job.modtime();
                            if time > job.modtime {
                                // file has been updated since we last looked
                                // at it, so need to look again
                                job.modtime = time;
                            } else {
                                eprintln!(
                                    "giving up on {} (id={}) for {:?}",
                                    job.program.filename(),
                                    job.job_id,
                                    e
                                );
                                to_remove.push(i);
                                failed_jobs.push(job.index);
                                remaining -= 1;
                            }
                        } else {
                            *retry -= 1;
                        }
                    }
                }
            }
        }
        // have to remove the highest index first so sort and reverse
        to_remove.sort();
        to_remove.reverse();
        for i in &to_remove {
            cur_jobs.swap_remove(*i);
        }
        log::debug!("finished {finished} jobs");
        if cur_jobs.is_empty() && out_of_jobs {
            dump.shutdown();
            eprintln!("{time}");
            failed_jobs.sort();
            return (job_time, failed_jobs);
        }
        if finished == 0 && total_jobs > 0 {
            wait(queue, &mut time, iter, remaining);
            qstat = queue.status();
        }
        iter += 1;
    }
}
