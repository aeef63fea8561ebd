use std::{fs::File, os::unix::prelude::AsRawFd, path::Path};

use clap::Parser;
use fbeos::{
    config::{Config, Queue},
    die, run,
};
use fbqs::queue::{local::Local, slurm::Slurm};

/// Birch-Murnaghan equation of state scans with Fireball
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
struct Args {
    /// input file
    #[arg(value_parser, default_value_t = String::from("fbeos.toml"))]
    infile: String,

    /// Overwrite existing output from a previous run. Defaults to false.
    #[arg(short, long, default_value_t = false)]
    overwrite: bool,

    /// Set the maximum number of threads to use. Defaults to 0, which means
    /// to use as many threads as there are CPUS.
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Don't delete any files when running the single-point energies.
    /// Defaults to false.
    #[arg(short, long, default_value_t = false)]
    no_del: bool,
}

fn main() -> Result<(), std::io::Error> {
    env_logger::init();
    let args = Args::parse();
    let path = Path::new("fbeos.out");
    if path.exists() && !args.overwrite {
        die!("existing fbeos output. overwrite with -o/--overwrite");
    }
    let outfile = File::create(path).expect("failed to create outfile");
    let logfile =
        File::create("fbeos.log").expect("failed to create log file");
    let out_fd = outfile.as_raw_fd();
    let log_fd = logfile.as_raw_fd();
    // redirect stdout to outfile and stderr to logfile
    unsafe {
        libc::dup2(out_fd, 1);
        libc::dup2(log_fd, 2);
    }
    let config = Config::load(&args.infile);
    println!("PID: {}", std::process::id());
    println!("{config}");
    fbqs::max_threads(args.threads);

    let report = match config.queue {
        Queue::Local => run(
            &Local::new(
                config.chunk_size,
                config.job_limit,
                config.sleep_int,
                "pts",
                args.no_del,
                config.queue_template.clone(),
            ),
            &config,
        ),
        Queue::Slurm => run(
            &Slurm::new(
                config.chunk_size,
                config.job_limit,
                config.sleep_int,
                "pts",
                args.no_del,
                config.queue_template.clone(),
            ),
            &config,
        ),
    };
    let report = report
        .unwrap_or_else(|e| die!("equation of state fit failed: {}", e.0));

    println!("{report}");

    let mut f = std::fs::File::create("eos.json")?;
    use std::io::Write;
    writeln!(f, "{}", serde_json::to_string_pretty(&report)?)?;

    println!("normal termination of fbeos");

    Ok(())
}
