//! Flow Meter Process
//!
//! Spawns the external flow meter on one interface and reads its JSON-lines
//! stdout. The meter's stderr is forwarded into the log. The child is killed
//! and reaped when the source is dropped.

use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;

use super::reader::read_line;
use super::{CaptureSettings, FlowSource, SourceError};

pub struct MeterProcess {
    command: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    buf: Vec<u8>,
}

impl MeterProcess {
    /// Start `command [extra_args..] --source <iface> <capture args..>`
    pub fn spawn(
        command: &str,
        extra_args: &[String],
        interface_name: &str,
        settings: &CaptureSettings,
    ) -> Result<Self, SourceError> {
        let spawn_error = |source: io::Error| SourceError::Spawn {
            command: command.to_string(),
            source,
        };

        let mut child = Command::new(command)
            .args(extra_args)
            .arg("--source")
            .arg(interface_name)
            .args(settings.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(spawn_error(io::Error::new(
                    io::ErrorKind::Other,
                    "meter stdout was not captured",
                )));
            }
        };

        if let Some(stderr) = child.stderr.take() {
            let name = command.to_string();
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    if !line.trim().is_empty() {
                        log::warn!("[{}] {}", name, line);
                    }
                }
            });
        }

        log::info!(
            "Flow meter '{}' started on {} (pid {})",
            command,
            interface_name,
            child.id()
        );

        Ok(Self {
            command: command.to_string(),
            child,
            stdout: BufReader::new(stdout),
            buf: Vec::with_capacity(4096),
        })
    }
}

impl FlowSource for MeterProcess {
    fn next_payload(&mut self) -> Result<Option<String>, SourceError> {
        while let Some(line) = read_line(&mut self.stdout, &mut self.buf)? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }

        // stdout closed: the meter is done, one way or another
        let status = self.child.wait()?;
        if status.success() {
            log::info!("Flow meter '{}' finished", self.command);
            Ok(None)
        } else {
            Err(SourceError::MeterExited(status))
        }
    }
}

impl Drop for MeterProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            log::debug!("Stopping flow meter '{}' (pid {})", self.command, self.child.id());
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}
