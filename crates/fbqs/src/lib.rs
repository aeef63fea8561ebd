use std::sync::LazyLock;

pub mod cgopt;
pub mod dos;
pub mod kpoints;
pub mod params;
pub mod program;
pub mod queue;
pub mod structure;
pub mod transport;

/// Whether or not the environment variable `FBQS_NO_RESUB` has been set.
static NO_RESUB: LazyLock<bool> =
    LazyLock::new(|| std::env::var("FBQS_NO_RESUB").is_ok());

/// time the duration of `$body` and store the resulting Duration in `$elapsed`
#[macro_export]
macro_rules! time {
    ($elapsed:ident, $body:block) => {
        let now = std::time::Instant::now();
        $body;
        let $elapsed = now.elapsed();
    };
}

/// call `rayon::ThreadPoolBuilder` to set `num_threads` to `n`. Discards the
/// error returned by `build_global` if the thread pool has already been
/// initialized
pub fn max_threads(n: usize) {
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build_global();
}
