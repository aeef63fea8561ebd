use std::collections::HashSet;

use crate::program::Program;
use crate::program::fireball::Fireball;
use crate::queue::Queue;

use super::{SubQueue, Submit};

/// Minimal implementation for running Fireball jobs locally
#[derive(Debug)]
pub struct Local {
    pub dir: String,
    pub chunk_size: usize,
    pub template: Option<String>,
}

impl Default for Local {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
            chunk_size: 128,
            template: None,
        }
    }
}

impl Local {
    pub fn new(
        chunk_size: usize,
        _job_limit: usize,
        _sleep_int: usize,
        dir: &str,
        _no_del: bool,
        template: Option<String>,
    ) -> Self {
        Self {
            dir: dir.to_string(),
            chunk_size,
            template,
        }
    }
}

impl Submit<Fireball> for Local {}

impl Queue<Fireball> for Local {
    fn template(&self) -> &Option<String> {
        &self.template
    }

    fn program_cmd(&self, filename: &str) -> String {
        format!("(cd {filename} && $FIREBALL_CMD > fireball.out)")
    }

    fn default_submit_script(&self) -> String {
        "FIREBALL_CMD=/opt/fireball/fireball.x\n".into()
    }
}

impl<P: Program + Clone> SubQueue<P> for Local {
    fn submit_command(&self) -> &str {
        "bash"
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn job_limit(&self) -> usize {
        1600
    }

    fn sleep_int(&self) -> usize {
        1
    }

    const SCRIPT_EXT: &'static str = "slurm";

    fn dir(&self) -> &str {
        &self.dir
    }

    fn stat_cmd(&self) -> String {
        String::new()
    }

    /// `bash` runs jobs synchronously, so nothing is ever pending in the
    /// queue
    fn status(&self) -> HashSet<String> {
        HashSet::new()
    }

    fn no_del(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_submit_script() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        <Local as Queue<Fireball>>::write_submit_script(
            &Local::default(),
            ["job.0000", "job.0001"].map(|s| s.into()),
            tmp.path().to_str().unwrap(),
        );
        let got = std::fs::read_to_string(tmp).unwrap();
        let want = "\
FIREBALL_CMD=/opt/fireball/fireball.x
(cd job.0000 && $FIREBALL_CMD > fireball.out)
(cd job.0001 && $FIREBALL_CMD > fireball.out)
";
        assert_eq!(got, want);
    }
}
