//! Live Log Tail
//!
//! [`LogSpooler`] follows a job's log file while the runner writes it.
//! Each call to [`Iterator::next`] returns the next available chunk,
//! sleeping between polls while the file has nothing new. Once the job
//! is no longer `Running` the file is drained one last time and the
//! sequence ends.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::error::Result;
use crate::job::{Job, JobState};

/// Iterator over chunks of a job's log.
///
/// A spooler is a live tail, not a replay: it cannot be rewound. Opening a
/// new one starts again from the beginning of the file.
#[derive(Debug)]
pub struct LogSpooler {
    job: Arc<Job>,
    file: Option<File>,
    poll_interval: Duration,
    chunk_size: usize,
    draining: bool,
}

impl LogSpooler {
    /// Opens the job's log from the start.
    ///
    /// A job without a log file (its workspace could not be created)
    /// yields an empty sequence.
    pub fn open(job: Arc<Job>, poll_interval: Duration, chunk_size: usize) -> Result<Self> {
        let file = match job.log_path() {
            Some(path) => Some(File::open(path)?),
            None => None,
        };

        Ok(Self {
            job,
            file,
            poll_interval,
            chunk_size: chunk_size.max(1),
            draining: false,
        })
    }

    /// Reads everything currently in the log into one buffer, following
    /// it until the job leaves `Running`.
    pub fn collect_bytes(self) -> Vec<u8> {
        self.flatten().collect()
    }

    fn finish(&mut self) -> Option<Vec<u8>> {
        self.file = None;
        None
    }
}

impl Iterator for LogSpooler {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        let chunk_size = self.chunk_size;

        loop {
            let file = self.file.as_mut()?;
            let mut buf = vec![0; chunk_size];

            match file.read(&mut buf) {
                Ok(0) if self.draining => return self.finish(),
                Ok(0) => {
                    if self.job.state() != JobState::Running {
                        // Bytes written just before exit may have landed
                        // after the last read; drain before stopping.
                        debug!("Job {} log: job settled, draining", self.job.id());
                        self.draining = true;
                        continue;
                    }
                    thread::sleep(self.poll_interval);
                }
                Ok(n) => {
                    buf.truncate(n);
                    return Some(buf);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Job {} log: read failed: {}", self.job.id(), e);
                    return self.finish();
                }
            }
        }
    }
}
