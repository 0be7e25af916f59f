//! One send/receive attempt.
//!
//! Owns both pipeline processes and the pipe between them. Neither process
//! outlives the session: a half-launched pipeline is killed and reaped, and
//! both commands are spawned with `kill_on_drop`.

use crate::backend::{program_name, SnapshotBackend};
use crate::error::{RelocateError, Result, Stage};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Keep at most this much of each process's stderr for diagnostics.
const STDERR_TAIL_BYTES: usize = 16 * 1024;

/// Exit code recorded for a process that ended without one (killed by signal).
const SIGNAL_EXIT_BASE: i32 = 128;

pub struct TransferSession {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub baseline_bytes: u64,
    pub expected_bytes: u64,
    pub started_at: DateTime<Local>,
    started: Instant,
    serializer: PipelineProcess,
    deserializer: PipelineProcess,
}

/// A running pipeline stage and what we know about it so far.
struct PipelineProcess {
    child: Child,
    exit: Option<i32>,
    stderr: Option<JoinHandle<String>>,
}

impl PipelineProcess {
    fn new(mut child: Child) -> Self {
        let stderr = child.stderr.take().map(|err| tokio::spawn(drain_tail(err)));
        Self {
            child,
            exit: None,
            stderr,
        }
    }

    fn poll(&mut self) -> Result<Option<i32>> {
        if self.exit.is_none() {
            if let Some(status) = self.child.try_wait()? {
                self.exit = Some(exit_code(status));
            }
        }
        Ok(self.exit)
    }

    async fn stderr_tail(&mut self) -> String {
        match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        }
    }
}

impl TransferSession {
    /// Spawn serializer and deserializer with the serializer's stdout wired
    /// straight into the deserializer's stdin.
    pub async fn launch(
        backend: &dyn SnapshotBackend,
        source: &Path,
        destination: &Path,
        baseline_bytes: u64,
        expected_bytes: u64,
    ) -> Result<Self> {
        let mut send = backend.serializer(source);
        send.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut serializer = spawn(&mut send, Stage::Serialize)?;

        let pipe: Stdio = match serializer.stdout.take() {
            Some(stdout) => match TryInto::<Stdio>::try_into(stdout) {
                Ok(stdio) => stdio,
                Err(e) => {
                    abort(&mut serializer).await;
                    return Err(launch_failed(&send, Stage::Serialize, e));
                }
            },
            None => {
                abort(&mut serializer).await;
                return Err(launch_failed(
                    &send,
                    Stage::Serialize,
                    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout not captured"),
                ));
            }
        };

        let mut receive = backend.deserializer(destination);
        receive
            .stdin(pipe)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let deserializer = match spawn(&mut receive, Stage::Deserialize) {
            Ok(child) => child,
            Err(e) => {
                abort(&mut serializer).await;
                return Err(e);
            }
        };

        tracing::debug!(
            serializer = ?serializer.id(),
            deserializer = ?deserializer.id(),
            "Pipeline started"
        );

        Ok(Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            baseline_bytes,
            expected_bytes,
            started_at: Local::now(),
            started: Instant::now(),
            serializer: PipelineProcess::new(serializer),
            deserializer: PipelineProcess::new(deserializer),
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Non-blocking status check of both processes. Returns both exit codes
    /// once, and only once, both are terminal.
    pub fn poll(&mut self) -> Result<Option<(i32, i32)>> {
        let send = self.serializer.poll()?;
        let recv = self.deserializer.poll()?;
        Ok(send.zip(recv))
    }

    /// Collected stderr of both processes. Only meaningful after `poll`
    /// reported both terminal.
    pub async fn diagnostics(&mut self) -> (String, String) {
        let send = self.serializer.stderr_tail().await;
        let recv = self.deserializer.stderr_tail().await;
        (send, recv)
    }
}

fn spawn(cmd: &mut Command, stage: Stage) -> Result<Child> {
    cmd.spawn().map_err(|e| launch_failed(cmd, stage, e))
}

fn launch_failed(cmd: &Command, stage: Stage, source: std::io::Error) -> RelocateError {
    RelocateError::TransferLaunchFailed {
        stage,
        program: program_name(cmd),
        source,
    }
}

/// Kill and reap a process whose partner could not be started.
async fn abort(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill orphaned pipeline process: {}", e);
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return SIGNAL_EXIT_BASE + signal;
        }
    }
    -1
}

/// Read a stream to the end, keeping only the last `STDERR_TAIL_BYTES`.
async fn drain_tail<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Err(e) => {
                tracing::debug!("Stopped reading pipeline stderr: {}", e);
                break;
            }
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_tail_keeps_end() {
        let data = vec![b'a'; STDERR_TAIL_BYTES + 10]
            .into_iter()
            .chain(b"END".iter().copied())
            .collect::<Vec<u8>>();
        let tail = drain_tail(&data[..]).await;
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
        assert!(tail.ends_with("END"));
    }

    /// Yields `data` once, then fails every read.
    struct BrokenPipe {
        data: Option<Vec<u8>>,
    }

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(&data);
                    std::task::Poll::Ready(Ok(()))
                }
                None => std::task::Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "stderr closed",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_drain_tail_keeps_data_read_before_error() {
        let reader = BrokenPipe {
            data: Some(b"ERROR: cannot open snapshot\n".to_vec()),
        };
        let tail = drain_tail(reader).await;
        assert_eq!(tail, "ERROR: cannot open snapshot");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_from_signal() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("kill -9 $$")
            .spawn()
            .unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(exit_code(status), 137);
    }

    #[tokio::test]
    async fn test_exit_code_plain() {
        let mut child = Command::new("sh").arg("-c").arg("exit 4").spawn().unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(exit_code(status), 4);
    }
}
