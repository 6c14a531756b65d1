use crate::constants::{DEFAULT_ENGINE_PROGRAM, ENGINE_POLL_INTERVAL, ENGINE_PROBE_ARG};
use crate::error::{Result, ThumbnailError};
use crate::formats::OutputFormat;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Shared flag flipped by the interrupt handler.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One `vips <operation> <args...>` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub operation: &'static str,
    pub args: Vec<OsString>,
}

impl EngineCommand {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// `thumbnail <input> <output> <size> --size=down`: fit the longest side, never upscale.
    pub fn thumbnail(input: &Path, output: &Path, size: u32) -> Self {
        EngineCommand::new("thumbnail")
            .arg(input)
            .arg(output)
            .arg(size.to_string())
            .arg("--size=down")
    }

    pub fn jpegsave(input: &Path, output: &Path, quality: u8) -> Self {
        EngineCommand::new(OutputFormat::Jpeg.save_operation())
            .arg(input)
            .arg(output)
            .arg(format!("--Q={}", quality))
            .arg("--strip")
    }

    pub fn pngsave(input: &Path, output: &Path, compression: u8) -> Self {
        EngineCommand::new(OutputFormat::Png.save_operation())
            .arg(input)
            .arg(output)
            .arg(format!("--compression={}", compression))
    }

}

#[cfg(test)]
impl EngineCommand {
    pub(crate) fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|arg| arg == needle)
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vips {}", self.operation)?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

/// Handle on the external `vips` program.
#[derive(Debug, Clone)]
pub struct Engine {
    program: PathBuf,
    timeout: Option<Duration>,
    cancel: CancelFlag,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_PROGRAM)
    }
}

impl Engine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
            cancel: CancelFlag::new(),
        }
    }

    /// `None` waits for the engine indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Capability check: the program must resolve and `vips -l` must exit cleanly.
    pub fn probe(&self) -> Result<()> {
        let resolved =
            which::which(&self.program).map_err(|e| ThumbnailError::EngineUnavailable {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let status = Command::new(&resolved)
            .arg(ENGINE_PROBE_ARG)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| ThumbnailError::EngineUnavailable {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(ThumbnailError::EngineUnavailable {
                program: self.program.clone(),
                reason: format!(
                    "`{} {}` exited with {}",
                    self.program.display(),
                    ENGINE_PROBE_ARG,
                    status
                ),
            });
        }

        Ok(())
    }

    /// Runs one command with inherited stdout/stderr, enforcing the timeout
    /// and killing the child if the run is cancelled meanwhile.
    pub fn run(&self, command: &EngineCommand) -> Result<()> {
        if self.is_cancelled() {
            return Err(ThumbnailError::Cancelled);
        }
        crate::verbose!("{}", command);

        let mut child = Command::new(&self.program)
            .arg(command.operation)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ThumbnailError::EngineLaunch {
                program: self.program.clone(),
                source,
            })?;

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                // Ctrl-C reaches the engine too; its death is part of the interrupt.
                if self.is_cancelled() {
                    return Err(ThumbnailError::Cancelled);
                }
                return Err(ThumbnailError::EngineFailed {
                    operation: command.operation.to_string(),
                    status,
                });
            }

            if self.is_cancelled() {
                terminate(&mut child);
                return Err(ThumbnailError::Cancelled);
            }

            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    terminate(&mut child);
                    return Err(ThumbnailError::EngineTimeout {
                        operation: command.operation.to_string(),
                        timeout,
                    });
                }
            }

            thread::sleep(ENGINE_POLL_INTERVAL);
        }
    }
}

fn terminate(child: &mut Child) {
    // The child may have exited between try_wait and kill.
    let _ = child.kill();
    let _ = child.wait();
}
