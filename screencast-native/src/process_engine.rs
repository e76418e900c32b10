use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use screencast_core::{CodecEngine, CodecEngineFactory, EngineAssets, EngineError, EngineMode};
use tempfile::TempDir;

use crate::monitor::{parse_duration_line, ProgressState};

const PAYLOAD_NAME: &str = "codec-engine";
const STDERR_TAIL_LINES: usize = 20;
const SPAWN_ATTEMPTS: u32 = 5;

/// Runs engine builds as child processes.
///
/// Each initialized engine gets a private scratch directory holding the
/// materialized payload executable (`bin/`) and its virtual file namespace
/// (`fs/`). The directory is removed when the engine is dropped.
#[derive(Debug, Clone, Default)]
pub struct ProcessEngineFactory {
    scratch_parent: Option<PathBuf>,
}

impl ProcessEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create scratch directories under `parent` instead of the system temp dir.
    pub fn with_scratch_dir(parent: impl Into<PathBuf>) -> Self {
        Self {
            scratch_parent: Some(parent.into()),
        }
    }

    fn scratch(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("screencast-engine-");
        match self.scratch_parent {
            Some(ref parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
    }
}

impl CodecEngineFactory for ProcessEngineFactory {
    fn initialize(&self, mode: EngineMode, assets: EngineAssets) -> Result<Box<dyn CodecEngine>, EngineError> {
        if mode.needs_worker() && assets.worker.is_none() {
            return Err(EngineError::Initialization(format!(
                "{}-threaded build requires a worker asset",
                mode
            )));
        }
        if assets.payload.blob.is_empty() {
            return Err(EngineError::Initialization(format!(
                "payload {} is empty",
                assets.payload.path
            )));
        }

        let init_err = |e: io::Error| EngineError::Initialization(e.to_string());
        let scratch = self.scratch().map_err(init_err)?;
        let bin = scratch.path().join("bin");
        let namespace = scratch.path().join("fs");
        fs::create_dir_all(&bin).map_err(init_err)?;
        fs::create_dir_all(&namespace).map_err(init_err)?;

        let program = bin.join(PAYLOAD_NAME);
        fs::write(&program, assets.payload.blob.bytes()).map_err(init_err)?;
        mark_executable(&program).map_err(init_err)?;

        let version = probe(&program)?;
        log::info!(
            "initialized {}-threaded engine from {} ({} bytes, script {}): {}",
            mode,
            assets.payload.path,
            assets.payload.blob.len(),
            assets.script.path,
            version
        );

        Ok(Box::new(ProcessEngine {
            mode,
            program,
            namespace,
            _scratch: scratch,
        }))
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Spawn, retrying while the freshly written payload is still held open for
/// writing by a concurrently forked child.
fn spawn(command: &mut Command) -> io::Result<Child> {
    let mut attempt = 1;
    loop {
        match command.spawn() {
            Err(e) if e.kind() == io::ErrorKind::ExecutableFileBusy && attempt < SPAWN_ATTEMPTS => {
                attempt += 1;
                thread::sleep(Duration::from_millis(20));
            }
            result => return result,
        }
    }
}

/// Kills and reaps the engine process on drop unless it was waited on.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child, reaped: false }
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            log::debug!("could not kill engine process {}: {}", self.child.id(), e);
        }
        if let Err(e) = self.child.wait() {
            log::warn!("could not reap engine process {}: {}", self.child.id(), e);
        }
    }
}

/// Run `<payload> -version` and return the first line it prints.
fn probe(program: &Path) -> Result<String, EngineError> {
    let child = spawn(
        Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped()),
    )
    .map_err(|e| EngineError::Initialization(format!("payload is not runnable: {}", e)))?;

    let output = child
        .wait_with_output()
        .map_err(|e| EngineError::Initialization(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Initialization(format!(
            "version probe failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

/// One initialized engine build backed by a child process per `exec`.
pub struct ProcessEngine {
    mode: EngineMode,
    program: PathBuf,
    namespace: PathBuf,
    _scratch: TempDir,
}

impl ProcessEngine {
    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    /// Namespace entries are flat file names.
    fn entry(&self, name: &str) -> Result<PathBuf, EngineError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(EngineError::Namespace(format!("invalid file name: {:?}", name)));
        }
        Ok(self.namespace.join(name))
    }

    /// Full command line: quiet machine-readable progress, the caller's
    /// profile, and the thread count for this build before the output name.
    fn command_args(&self, args: &[String]) -> Vec<String> {
        let mut full: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-progress", "pipe:1", "-nostats"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let threads = match self.mode {
            EngineMode::Single => "1",
            EngineMode::Multi => "0",
        };
        match args.split_last() {
            Some((output, rest)) => {
                full.extend(rest.iter().cloned());
                full.extend(["-threads".to_string(), threads.to_string(), output.clone()]);
            }
            None => full.extend(["-threads".to_string(), threads.to_string()]),
        }
        full
    }
}

impl CodecEngine for ProcessEngine {
    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.entry(name)?;
        fs::write(path, data).map_err(|e| EngineError::Namespace(format!("write {}: {}", name, e)))
    }

    fn exec(&mut self, args: &[String], on_progress: &mut dyn FnMut(f64)) -> Result<(), EngineError> {
        let full = self.command_args(args);
        log::debug!("exec {} {}", self.program.display(), full.join(" "));

        let mut child = spawn(
            Command::new(&self.program)
                .args(&full)
                .current_dir(&self.namespace)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped()),
        )
        .map(ChildGuard::new)
        .map_err(|e| EngineError::Exec(format!("failed to start engine: {}", e)))?;

        let stdout = child
            .child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Exec("failed to capture engine stdout".into()))?;
        let stderr = child
            .child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Exec("failed to capture engine stderr".into()))?;

        // Drain stderr concurrently so the child never blocks on a full pipe.
        let duration: Arc<Mutex<Option<f64>>> = Arc::new(Mutex::new(None));
        let stderr_duration = Arc::clone(&duration);
        let stderr_task = thread::Builder::new()
            .name("codec-engine-stderr".into())
            .spawn(move || {
                let mut tail: Vec<String> = Vec::new();
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    if let Some(secs) = parse_duration_line(&line) {
                        stderr_duration.lock().get_or_insert(secs);
                    }
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.remove(0);
                    }
                    tail.push(line);
                }
                tail.join("\n")
            })
            .map_err(|e| EngineError::Exec(format!("failed to spawn stderr reader: {}", e)))?;

        let mut state = ProgressState::default();
        let mut read_error = None;
        for line in BufReader::new(stdout).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            };
            if state.update(&line) {
                if let Some(ratio) = state.ratio(*duration.lock()) {
                    on_progress(ratio);
                }
            }
        }

        if let Some(e) = read_error {
            // Killing the child closes its stderr, which ends the reader.
            drop(child);
            let _ = stderr_task.join();
            return Err(EngineError::Exec(format!("failed reading engine progress: {}", e)));
        }

        let status = child
            .wait()
            .map_err(|e| EngineError::Exec(format!("failed to wait on engine: {}", e)))?;
        let stderr_tail = stderr_task
            .join()
            .unwrap_or_else(|_| "<stderr reader panicked>".to_string());

        if !status.success() {
            return Err(EngineError::Exec(format!("engine exited with {}: {}", status, stderr_tail.trim())));
        }
        Ok(())
    }

    fn read_file(&mut self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.entry(name)?;
        fs::read(path).map_err(|e| EngineError::Namespace(format!("read {}: {}", name, e)))
    }

    fn delete_file(&mut self, name: &str) -> Result<(), EngineError> {
        let path = self.entry(name)?;
        fs::remove_file(path).map_err(|e| EngineError::Namespace(format!("delete {}: {}", name, e)))
    }
}
