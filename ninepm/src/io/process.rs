//! Running a case process while streaming its stdout line by line.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How a streamed child process ended.
#[derive(Debug)]
pub struct StreamedExit {
    pub status: ExitStatus,
    pub timed_out: bool,
    /// Number of stdout lines handed to the callback.
    pub lines: u64,
}

/// Spawn `cmd` and hand each stdout line to `on_line` as it arrives.
///
/// Stdout is read on a scoped thread while this thread waits for the process,
/// so memory stays bounded by the longest line. Stderr is inherited. With a
/// `timeout`, the process runs in its own process group on Unix and the whole
/// group is killed once it expires, so descendants holding stdout open cannot
/// keep the reader alive. Lines are decoded lossily and passed without their
/// line terminator.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs())))]
pub fn run_streaming<F>(
    mut cmd: Command,
    timeout: Option<Duration>,
    mut on_line: F,
) -> Result<StreamedExit>
where
    F: FnMut(&str) + Send,
{
    cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());
    if timeout.is_some() {
        set_process_group(&mut cmd);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;

    thread::scope(|scope| -> Result<StreamedExit> {
        let reader = scope.spawn(|| read_lines(stdout, &mut on_line));

        let mut timed_out = false;
        let status = match timeout {
            Some(limit) => match child.wait_timeout(limit).context("wait for command")? {
                Some(status) => status,
                None => {
                    warn!(timeout_secs = limit.as_secs(), "command timed out, killing");
                    timed_out = true;
                    kill_tree(&mut child).context("kill command")?;
                    child.wait().context("wait command after kill")?
                }
            },
            None => child.wait().context("wait for command")?,
        };

        let lines = match reader.join() {
            Ok(result) => result.context("read stdout")?,
            Err(_) => return Err(anyhow!("output reader thread panicked")),
        };

        debug!(exit_code = ?status.code(), timed_out, lines, "command finished");
        Ok(StreamedExit {
            status,
            timed_out,
            lines,
        })
    })
}

#[cfg(unix)]
fn set_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn set_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(child.id()).map_err(std::io::Error::other)?;
    // The child leads its own group, so the negated pid addresses every member.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    debug!(err = %err, "process group kill failed, killing child only");
    child.kill()
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

fn read_lines<R: Read, F: FnMut(&str)>(reader: R, on_line: &mut F) -> Result<u64> {
    let mut buf_reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut count = 0u64;

    loop {
        line.clear();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        on_line(text.trim_end_matches(['\n', '\r']));
        count += 1;
    }

    Ok(count)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn streams_lines_in_order() {
        let mut seen = Vec::new();
        let exit = run_streaming(sh("printf '1..2\\nok 1 - a\\r\\nok 2 - b'"), None, |line| {
            seen.push(line.to_string());
        })
        .expect("run");

        assert!(exit.status.success());
        assert!(!exit.timed_out);
        assert_eq!(exit.lines, 3);
        assert_eq!(seen, vec!["1..2", "ok 1 - a", "ok 2 - b"]);
    }

    #[test]
    fn reports_nonzero_exit() {
        let exit = run_streaming(sh("echo hi; exit 3"), None, |_| {}).expect("run");
        assert_eq!(exit.status.code(), Some(3));
    }

    #[test]
    fn kills_process_after_timeout() {
        let exit = run_streaming(
            sh("echo started; exec sleep 5"),
            Some(Duration::from_millis(200)),
            |_| {},
        )
        .expect("run");
        assert!(exit.timed_out);
        assert!(!exit.status.success());
    }

    #[test]
    fn timeout_kills_descendants_holding_stdout() {
        let started = Instant::now();
        let exit = run_streaming(
            sh("echo 1..1; sleep 8; echo 'ok 1 - late'"),
            Some(Duration::from_millis(300)),
            |_| {},
        )
        .expect("run");
        assert!(exit.timed_out);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn lines_arrive_while_process_is_running() {
        let (tx, rx) = mpsc::channel();
        let marker = tempfile::NamedTempFile::new().expect("marker");
        let marker_path = marker.path().to_path_buf();
        let script = format!(
            "echo first; while [ -e '{}' ]; do sleep 0.05; done; echo second",
            marker_path.display()
        );

        let releaser = thread::spawn(move || {
            let line: String = rx.recv_timeout(Duration::from_secs(5)).expect("first line");
            drop(marker);
            line
        });
        let mut seen = Vec::new();
        let exit = run_streaming(sh(&script), None, |line| {
            if seen.is_empty() {
                tx.send(line.to_string()).expect("send");
            }
            seen.push(line.to_string());
        })
        .expect("run");

        assert_eq!(releaser.join().expect("join"), "first");
        assert!(exit.status.success());
        assert_eq!(seen, vec!["first", "second"]);
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let err = run_streaming(
            Command::new("/definitely/not/a/real/binary"),
            None,
            |_| {},
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn command"));
    }
}
