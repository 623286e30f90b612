//! Small helpers around `std::process::Command` for the handful of external
//! binaries this stage shells out to (`useradd`, `groupadd`, `chpasswd`,
//! `systemctl`, and the NTFS `mount`/`umount` helpers).

use std::process::Command;

use anyhow::{bail, Context, Result};

/// Extension trait for [`Command`] matching the small set of invocation
/// patterns this crate needs: a debug trace before running, and turning a
/// non-zero exit status into a proper error with the command line attached.
pub trait CommandRunExt {
    /// Emit a `tracing::debug!` line describing the command about to run.
    fn log_debug(&mut self) -> &mut Self;

    /// Run the command with inherited stdio, returning an error (including
    /// the command line) if it exits non-zero or fails to spawn.
    fn run_inherited_with_cmd_context(&mut self) -> Result<()>;

    /// Run the command capturing stdout; on failure, include captured stderr
    /// in the error.
    fn run_capture_stdout(&mut self) -> Result<Vec<u8>>;
}

impl CommandRunExt for Command {
    fn log_debug(&mut self) -> &mut Self {
        tracing::debug!("running: {self:?}");
        self
    }

    fn run_inherited_with_cmd_context(&mut self) -> Result<()> {
        let status = self
            .status()
            .with_context(|| format!("spawning {self:?}"))?;
        if !status.success() {
            bail!("command {self:?} failed: {status}");
        }
        Ok(())
    }

    fn run_capture_stdout(&mut self) -> Result<Vec<u8>> {
        let output = self.output().with_context(|| format!("spawning {self:?}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("command {self:?} failed: {}: {stderr}", output.status);
        }
        Ok(output.stdout)
    }
}
