//! Live audio streams through an ffmpeg subprocess
//!
//! The transcoder reads the remote stream, drops any video, copies the audio
//! codec and writes WAV on stdout (the HLS input container cannot be
//! re-emitted as is). The first bytes must show up within the startup
//! timeout, otherwise the attempt counts as failed.
//!
//! ffmpeg ignores SIGTERM, so teardown always uses SIGKILL, bounded by the
//! kill timeout. Startup failures and [`StreamHandle::stop`] share the same
//! [`terminate`] path.
//!
//! Streams cannot be paused or resumed: stopping kills the process, and
//! playing again means asking for a new stream.

use crate::config::{SverigesRadioConfig, DEFAULT_KILL_TIMEOUT_MS, DEFAULT_STARTUP_TIMEOUT_MS};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, ReadBuf};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Number of stderr lines kept for diagnostics
const STDERR_BACKLOG: usize = 200;

/// Size of the first read used to detect a successful start
const STARTUP_READ_SIZE: usize = 8192;

/// How a transcoder process was torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// No process was ever started
    NotSpawned,
    /// The process had already exited on its own
    AlreadyExited,
    /// SIGKILL was delivered and the process reaped
    Killed,
    /// Sending the signal or reaping failed (logged)
    Failed,
    /// The process did not go away within the kill timeout
    TimedOut,
}

impl Termination {
    /// Whether no process is left behind
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            Termination::NotSpawned | Termination::AlreadyExited | Termination::Killed
        )
    }
}

/// SIGKILL `child` and wait at most `timeout` for it to be reaped
///
/// Never fails: problems are logged and reported in the returned
/// [`Termination`].
pub async fn terminate(child: &mut Child, timeout: Duration) -> Termination {
    let pid = child.id();

    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(?pid, %status, "Transcoder already exited");
            return Termination::AlreadyExited;
        }
        Ok(None) => {}
        Err(e) => {
            error!(?pid, error = %e, "Failed to query transcoder status");
            return Termination::Failed;
        }
    }

    if let Err(e) = child.start_kill() {
        // The process may have exited between the two calls
        if let Ok(Some(_)) = child.try_wait() {
            return Termination::AlreadyExited;
        }
        error!(?pid, error = %e, "Failed to kill transcoder");
        return Termination::Failed;
    }

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(?pid, %status, "Transcoder killed");
            Termination::Killed
        }
        Ok(Err(e)) => {
            error!(?pid, error = %e, "Failed to reap killed transcoder");
            Termination::Failed
        }
        Err(_elapsed) => {
            error!(?pid, ?timeout, "Transcoder did not exit after SIGKILL");
            Termination::TimedOut
        }
    }
}

/// Spawns the transcoder for a stream URL
#[derive(Debug, Clone)]
pub struct StreamLauncher {
    ffmpeg_path: PathBuf,
    startup_timeout: Duration,
    kill_timeout: Duration,
}

impl StreamLauncher {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            startup_timeout: Duration::from_millis(DEFAULT_STARTUP_TIMEOUT_MS),
            kill_timeout: Duration::from_millis(DEFAULT_KILL_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &SverigesRadioConfig) -> Self {
        Self::new(config.ffmpeg_path.clone())
            .with_startup_timeout(config.startup_timeout())
            .with_kill_timeout(config.kill_timeout())
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    /// Arguments passed to ffmpeg for a given input URL
    pub fn transcode_args(contents: &str) -> Vec<String> {
        ["-i", contents, "-vn", "-acodec", "copy", "-f", "wav", "-"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Start transcoding `contents` and hand back the live output
    ///
    /// On failure the process (if any) has been killed before the error is
    /// returned; the error is always [`Error::StreamStart`].
    pub async fn launch(&self, uri: &str, contents: &str) -> Result<StreamHandle> {
        debug!(%uri, %contents, ffmpeg = %self.ffmpeg_path.display(), "Starting transcoder");

        let mut child = Command::new(&self.ffmpeg_path)
            .args(Self::transcode_args(contents))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::StreamStart {
                uri: uri.to_string(),
                source: Box::new(Error::Io(e)),
                termination: Termination::NotSpawned,
            })?;

        let stderr = Arc::new(Mutex::new(VecDeque::new()));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(collect_stderr(pipe, Arc::clone(&stderr))));

        let Some(mut stdout) = child.stdout.take() else {
            let cause = Error::Process("transcoder stdout was not captured".to_string());
            return Err(self.abort(uri, child, cause, false, &stderr, stderr_task).await);
        };

        let mut first = vec![0u8; STARTUP_READ_SIZE];
        let first_read = tokio::time::timeout(self.startup_timeout, stdout.read(&mut first)).await;
        let output_closed = matches!(first_read, Ok(Ok(0)));
        let cause = match first_read {
            Ok(Ok(n)) if n > 0 => {
                first.truncate(n);
                info!(%uri, pid = ?child.id(), "Transcoder started");
                return Ok(StreamHandle {
                    uri: uri.to_string(),
                    head: first,
                    head_pos: 0,
                    stdout,
                    child,
                    kill_timeout: self.kill_timeout,
                    stderr,
                    stderr_task,
                });
            }
            Ok(Ok(_)) => Error::Process("transcoder exited before producing output".to_string()),
            Ok(Err(e)) => Error::Io(e),
            Err(_elapsed) => Error::Timeout(self.startup_timeout),
        };

        Err(self
            .abort(uri, child, cause, output_closed, &stderr, stderr_task)
            .await)
    }

    /// Log what the transcoder said, kill it, and build the caller's error
    async fn abort(
        &self,
        uri: &str,
        mut child: Child,
        cause: Error,
        output_closed: bool,
        stderr: &Mutex<VecDeque<String>>,
        stderr_task: Option<JoinHandle<()>>,
    ) -> Error {
        // A process that closed its output is exiting; let the collector
        // drain stderr up to EOF
        let exited = output_closed || matches!(child.try_wait(), Ok(Some(_)));
        if let (true, Some(task)) = (exited, stderr_task) {
            let _ = tokio::time::timeout(self.kill_timeout, task).await;
        }

        let lines = stderr.lock().await;
        if !lines.is_empty() {
            let joined = lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n\t");
            warn!(%uri, "Transcoder output:\n\t{}\n", joined);
        }
        drop(lines);

        let termination = terminate(&mut child, self.kill_timeout).await;
        warn!(%uri, error = %cause, ?termination, "Failed to start transcoder");

        Error::StreamStart {
            uri: uri.to_string(),
            source: Box::new(cause),
            termination,
        }
    }
}

async fn collect_stderr(pipe: ChildStderr, sink: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut sink = sink.lock().await;
        if sink.len() == STDERR_BACKLOG {
            sink.pop_front();
        }
        sink.push_back(line);
    }
}

/// A running transcoder's audio output
///
/// Owns the process: dropping the handle kills it, [`stop`](Self::stop)
/// kills it and waits for it. Reading yields the WAV bytes, starting with
/// those already consumed while checking the startup.
#[derive(Debug)]
pub struct StreamHandle {
    uri: String,
    head: Vec<u8>,
    head_pos: usize,
    stdout: ChildStdout,
    child: Child,
    kill_timeout: Duration,
    stderr: Arc<Mutex<VecDeque<String>>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Uri of the track being played
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// OS pid of the transcoder, while it has not been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Recent transcoder diagnostics
    pub async fn stderr_lines(&self) -> Vec<String> {
        self.stderr.lock().await.iter().cloned().collect()
    }

    /// Kill the transcoder
    ///
    /// Safe to call several times and after the process exited by itself.
    pub async fn stop(&mut self) -> Termination {
        let termination = terminate(&mut self.child, self.kill_timeout).await;
        info!(uri = %self.uri, ?termination, "Stopped Sveriges Radio stream");
        termination
    }
}

impl AsyncRead for StreamHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();

        if this.head_pos < this.head.len() {
            let pending = &this.head[this.head_pos..];
            let n = pending.len().min(buf.remaining());
            buf.put_slice(&pending[..n]);
            this.head_pos += n;
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.stdout).poll_read(cx, buf)
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_args() {
        assert_eq!(
            StreamLauncher::transcode_args("https://live-cdn.sr.se/p1.m3u8"),
            vec![
                "-i",
                "https://live-cdn.sr.se/p1.m3u8",
                "-vn",
                "-acodec",
                "copy",
                "-f",
                "wav",
                "-"
            ]
        );
    }

    #[test]
    fn test_termination_cleanliness() {
        assert!(Termination::Killed.is_clean());
        assert!(Termination::AlreadyExited.is_clean());
        assert!(!Termination::TimedOut.is_clean());
        assert!(!Termination::Failed.is_clean());
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_start_failure() {
        let launcher = StreamLauncher::new("/nonexistent/ffmpeg_xyz_12345");
        let err = launcher
            .launch("sverigesradio:p1", "https://live-cdn.sr.se/p1.m3u8")
            .await
            .unwrap_err();

        match err {
            Error::StreamStart { termination, .. } => {
                assert_eq!(termination, Termination::NotSpawned)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
