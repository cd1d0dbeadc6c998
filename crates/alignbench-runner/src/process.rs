//! Running a single job as a resource-limited backend process.
//!
//! The backend is invoked as `<backend> <algo> <native args...>`, reads the
//! job as JSON on stdin and writes a [`JobOutput`] as JSON on stdout. CPU time
//! and data segment size are limited with rlimits set in the child before
//! `exec`; a wall-clock watchdog in the harness catches processes that sleep
//! or block instead of burning CPU.
//!
//! The harness reaps the backend itself with `wait4` so that the CPU time and
//! peak RSS of every job are recorded next to its wall time.

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use alignbench_types::{
    ByteSize, Dataset, Job, JobError, JobOutput, JobResult, ResourceUsage, SeqStats,
};
use async_trait::async_trait;
use nix::libc;
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::adapter::adapter_for;
use crate::dataset::{dataset_stats, seq_stats};

/// Exit code a backend uses after a panic.
pub const EXIT_PANIC: i32 = 101;
/// Exit code a backend uses for parameter combinations it cannot run.
pub const EXIT_UNSUPPORTED: i32 = 102;

/// Where a worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSlot {
    pub index: usize,
    /// Core to pin the backend to, if pinning is enabled.
    pub core: Option<usize>,
}

/// Executes jobs. The orchestrator only talks to this trait.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run a job to completion. Failures are recorded in the returned
    /// result, never raised.
    ///
    /// Once `cancel` reads `true` the job is abandoned and reported as
    /// [`JobError::Interrupted`].
    async fn run(&self, job: Job, slot: WorkerSlot, cancel: watch::Receiver<bool>) -> JobResult;
}

/// Backend invocation settings.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Backend executable.
    pub backend: PathBuf,
    /// Arguments placed before the aligner name.
    pub backend_args: Vec<String>,
    /// Pass the backend's stderr through instead of capturing it.
    pub show_stderr: bool,
    /// Log captured stderr of failed jobs.
    pub verbose: bool,
    /// Added to twice the time limit to form the wall-clock deadline.
    pub wall_clock_slack: Duration,
}

impl ProcessConfig {
    pub fn new(backend: impl Into<PathBuf>) -> Self {
        Self {
            backend: backend.into(),
            backend_args: Vec::new(),
            show_stderr: false,
            verbose: false,
            wall_clock_slack: Duration::from_secs(1),
        }
    }

    /// Wall-clock deadline for a job.
    pub fn deadline(&self, job: &Job) -> Duration {
        job.time_limit * 2 + self.wall_clock_slack
    }
}

/// Map a non-successful exit status to a job error.
pub fn classify_failure(status: ExitStatus) -> JobError {
    if let Some(signal) = status.signal() {
        return match signal {
            libc::SIGINT => JobError::Interrupted,
            libc::SIGABRT => JobError::MemoryLimit,
            libc::SIGKILL | libc::SIGXCPU => JobError::Timeout,
            n => JobError::Signal(n),
        };
    }
    match status.code() {
        Some(EXIT_PANIC) => JobError::Panic,
        Some(EXIT_UNSUPPORTED) => JobError::Unsupported,
        Some(code) => JobError::ExitCode(code),
        None => JobError::ExitCode(-1),
    }
}

fn signal_name(signal: i32) -> &'static str {
    Signal::try_from(signal).map(|s| s.as_str()).unwrap_or("unknown")
}

/// Limits applied in the child between `fork` and `exec`.
#[derive(Debug, Clone, Copy)]
struct ChildLimits {
    cpu_secs: u64,
    data_bytes: u64,
    core: Option<usize>,
}

impl ChildLimits {
    fn for_job(job: &Job, core: Option<usize>) -> Self {
        Self {
            cpu_secs: (job.time_limit.as_secs_f64().ceil() as u64).max(1),
            data_bytes: job.mem_limit.as_u64(),
            core,
        }
    }

    /// Only async-signal-safe calls are allowed here.
    fn apply(&self) -> std::io::Result<()> {
        set_limit(Resource::RLIMIT_CPU, self.cpu_secs, self.cpu_secs + 1)?;
        set_limit(Resource::RLIMIT_DATA, self.data_bytes, self.data_bytes)?;

        if let Some(core) = self.core {
            pin_to_core(core)?;
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn pin_to_core(core: usize) -> std::io::Result<()> {
    use nix::sched::{sched_setaffinity, CpuSet};

    let mut set = CpuSet::new();
    set.set(core)?;
    sched_setaffinity(Pid::from_raw(0), &set)?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(_core: usize) -> std::io::Result<()> {
    Ok(())
}

/// Lower a limit, never raising it above the inherited hard limit.
fn set_limit(resource: Resource, soft: u64, hard: u64) -> std::io::Result<()> {
    let (_, current_hard) = getrlimit(resource)?;
    let cap = |v: u64| {
        let v = v as libc::rlim_t;
        if current_hard == libc::RLIM_INFINITY {
            v
        } else {
            v.min(current_hard)
        }
    };
    setrlimit(resource, cap(soft), cap(hard))?;
    Ok(())
}

/// A spawned backend that only the harness reaps.
///
/// Until [`Backend::reap`] succeeds the pid cannot be reused, so killing it
/// is always safe. Dropping an unreaped backend kills it; tokio reaps the
/// zombie.
struct Backend {
    pid: Pid,
    reaped: bool,
}

impl Backend {
    fn new(pid: u32) -> Self {
        Self {
            pid: Pid::from_raw(pid as libc::pid_t),
            reaped: false,
        }
    }

    fn kill(&self) {
        if !self.reaped {
            let _ = kill(self.pid, Signal::SIGKILL);
        }
    }

    /// Collect the exit status and resource usage of an exited backend.
    fn reap(&mut self) -> std::io::Result<(ExitStatus, libc::rusage)> {
        let mut status = 0;
        // SAFETY: rusage is plain data filled in by the kernel.
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        loop {
            // SAFETY: both pointers refer to live locals.
            let rc = unsafe { libc::wait4(self.pid.as_raw(), &mut status, 0, &mut usage) };
            if rc == self.pid.as_raw() {
                self.reaped = true;
                return Ok((ExitStatus::from_raw(status), usage));
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Block until `pid` has exited, leaving it unreaped.
fn wait_exited(pid: libc::pid_t) -> std::io::Result<()> {
    loop {
        // SAFETY: siginfo_t is plain data filled in by the kernel.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: `info` is a live local.
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn seconds(tv: libc::timeval) -> f64 {
    tv.tv_sec as f64 + tv.tv_usec as f64 / 1e6
}

/// `ru_maxrss` is in KiB on Linux and in bytes on macOS.
fn max_rss(usage: &libc::rusage) -> ByteSize {
    let raw = usage.ru_maxrss.max(0) as u64;
    if cfg!(target_os = "macos") {
        ByteSize(raw)
    } else {
        ByteSize::kib(raw)
    }
}

fn resource_usage(walltime: Duration, usage: &libc::rusage) -> ResourceUsage {
    ResourceUsage {
        walltime: walltime.as_secs_f64(),
        usertime: seconds(usage.ru_utime),
        systemtime: seconds(usage.ru_stime),
        maxrss: max_rss(usage),
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// How waiting for a backend ended.
enum Outcome {
    Exited(std::io::Result<(Vec<u8>, Vec<u8>)>, std::io::Result<()>),
    Aborted(JobError),
}

async fn cancelled(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        // Sender gone: nobody can cancel anymore.
        std::future::pending::<()>().await;
    }
}

/// Runs jobs by spawning the backend process.
pub struct ProcessRunner {
    config: ProcessConfig,
    stats: Mutex<HashMap<PathBuf, SeqStats>>,
}

impl ProcessRunner {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Dataset statistics, read once per file on a blocking thread.
    async fn stats_for(&self, dataset: &Dataset) -> Result<SeqStats, String> {
        let Dataset::File(path) = dataset else {
            return dataset_stats(dataset).map_err(|e| e.to_string());
        };
        if let Ok(cache) = self.stats.lock() {
            if let Some(stats) = cache.get(path) {
                return Ok(*stats);
            }
        }
        let file = path.clone();
        let stats = tokio::task::spawn_blocking(move || seq_stats(&file))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;
        if let Ok(mut cache) = self.stats.lock() {
            cache.insert(path.clone(), stats);
        }
        Ok(stats)
    }

    fn command(&self, job: &Job, native_args: &[String], slot: WorkerSlot) -> Command {
        let mut cmd = Command::new(&self.config.backend);
        cmd.args(&self.config.backend_args)
            .arg(job.algo.name())
            .args(native_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if self.config.show_stderr {
                Stdio::inherit()
            } else {
                Stdio::piped()
            })
            .kill_on_drop(false);

        let limits = ChildLimits::for_job(job, slot.core);
        // SAFETY: the closure only issues setrlimit/sched_setaffinity
        // syscalls and does not allocate.
        unsafe {
            cmd.pre_exec(move || limits.apply());
        }
        cmd
    }

    async fn execute(
        &self,
        job: &Job,
        slot: WorkerSlot,
        cancel: watch::Receiver<bool>,
        stats: &mut SeqStats,
        usage: &mut ResourceUsage,
    ) -> Result<JobOutput, JobError> {
        let adapter = adapter_for(&job.algo);
        if let Err(reason) = adapter.check(job) {
            debug!(job = %job.short_id(), algo = adapter.name(), %reason, "Skipping unsupported job");
            return Err(JobError::Unsupported);
        }
        if *cancel.borrow() {
            return Err(JobError::Interrupted);
        }

        *stats = self
            .stats_for(&job.dataset)
            .await
            .map_err(|e| JobError::Spawn(format!("cannot read dataset: {e}")))?;
        let native_args = adapter.native_args(job, stats);
        let input = serde_json::to_vec(job).map_err(|e| JobError::Spawn(e.to_string()))?;

        debug!(
            job = %job.short_id(),
            backend = %self.config.backend.display(),
            args = ?native_args,
            worker = slot.index,
            "Spawning backend"
        );

        let start = Instant::now();
        let mut child = self
            .command(job, &native_args, slot)
            .spawn()
            .map_err(|e| JobError::Spawn(format!("{}: {e}", self.config.backend.display())))?;
        let Some(pid) = child.id() else {
            return Err(JobError::Spawn("backend exited before it was tracked".to_string()));
        };
        // Declared after `child` so it is dropped first.
        let mut backend = Backend::new(pid);
        let mut exited = tokio::task::spawn_blocking(move || wait_exited(pid as libc::pid_t));

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let io = async move {
            let feed = async move {
                if let Some(mut stdin) = stdin {
                    match stdin.write_all(&input).await {
                        Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                        _ => {}
                    }
                }
                Ok(())
            };
            let (fed, out, err) = tokio::join!(feed, read_all(stdout), read_all(stderr));
            fed?;
            Ok::<_, std::io::Error>((out?, err?))
        };
        // The exit is only awaited once the pipes are drained, so an aborted
        // wait never consumes `exited`.
        let finished = async {
            let io = io.await;
            let exit = match (&mut exited).await {
                Ok(exit) => exit,
                Err(e) => Err(std::io::Error::other(e)),
            };
            (io, exit)
        };

        let deadline = self.config.deadline(job);
        let outcome = tokio::select! {
            res = tokio::time::timeout(deadline, finished) => match res {
                Ok((io, exit)) => Outcome::Exited(io, exit),
                Err(_) => {
                    warn!(job = %job.short_id(), deadline = ?deadline, "Wall-clock deadline exceeded, killing backend");
                    Outcome::Aborted(JobError::Timeout)
                }
            },
            _ = cancelled(cancel) => Outcome::Aborted(JobError::Interrupted),
        };

        let (io, exit) = match outcome {
            Outcome::Exited(io, exit) => (Ok(io), exit),
            Outcome::Aborted(err) => {
                backend.kill();
                let exit = match exited.await {
                    Ok(exit) => exit,
                    Err(e) => Err(std::io::Error::other(e)),
                };
                (Err(err), exit)
            }
        };
        exit.map_err(|e| JobError::Spawn(format!("waiting for backend: {e}")))?;
        let (status, rusage) = backend
            .reap()
            .map_err(|e| JobError::Spawn(format!("reaping backend: {e}")))?;
        *usage = resource_usage(start.elapsed(), &rusage);

        let (stdout, stderr) = io?.map_err(|e| JobError::Spawn(e.to_string()))?;

        if !status.success() {
            let err = classify_failure(status);
            if let Some(signal) = status.signal() {
                debug!(job = %job.short_id(), signal, name = signal_name(signal), "Backend killed by signal");
            }
            if self.config.verbose && !stderr.is_empty() {
                let stderr = String::from_utf8_lossy(&stderr);
                warn!(job = %job.short_id(), stderr = %stderr.trim_end(), "Backend stderr");
            }
            return Err(err);
        }

        serde_json::from_slice::<JobOutput>(&stdout)
            .map_err(|e| JobError::BadOutput(e.to_string()))
    }
}

#[async_trait]
impl JobRunner for ProcessRunner {
    async fn run(&self, job: Job, slot: WorkerSlot, cancel: watch::Receiver<bool>) -> JobResult {
        let mut stats = SeqStats::default();
        let mut resources = ResourceUsage::default();
        let output = self
            .execute(&job, slot, cancel, &mut stats, &mut resources)
            .await;

        match &output {
            Ok(out) => info!(
                job = %job.short_id(),
                algo = job.algo.name(),
                dataset = %job.dataset.describe(),
                runtime = out.measured.runtime,
                maxrss = %resources.maxrss,
                "Job succeeded"
            ),
            Err(JobError::Unsupported) | Err(JobError::Interrupted) => {}
            Err(err) => warn!(
                job = %job.short_id(),
                algo = job.algo.name(),
                dataset = %job.dataset.describe(),
                error = %err,
                "Job failed"
            ),
        }

        JobResult {
            job,
            stats,
            resources,
            output,
        }
    }
}
