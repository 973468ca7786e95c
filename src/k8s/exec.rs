/// Interactive exec sessions bridged to the local terminal
use std::io::{IsTerminal, Read};

use futures::channel::mpsc::Sender;
use futures::SinkExt;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams, TerminalSize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const EXIT_CODE_CAUSE: &str = "ExitCode";

const CHUNK_SIZE: usize = 8192;

type InputChunks = mpsc::Receiver<std::io::Result<Vec<u8>>>;

/// Exec parameters for an interactive TTY session in `container`
///
/// With a TTY the remote side writes stderr to the terminal stream, and kube
/// rejects `stderr` together with `tty`, so only stdin and stdout are attached.
pub fn attach_params(container: &str) -> AttachParams {
    AttachParams::interactive_tty().container(container)
}

/// Run `command` in the pod and relay the local terminal until it exits
pub async fn exec_interactive(
    api: &Api<Pod>,
    name: &str,
    container: &str,
    command: &[String],
) -> Result<()> {
    info!("Prepare to execute {:?} in pod {}...", command, name);

    let mut attached = api
        .exec(name, command.to_vec(), &attach_params(container))
        .await
        .map_err(|source| Error::ExecSetup {
            name: name.to_string(),
            source,
        })?;

    let stdin_writer = attached
        .stdin()
        .ok_or_else(|| missing_stream(name, "stdin"))?;
    let stdout_reader = attached
        .stdout()
        .ok_or_else(|| missing_stream(name, "stdout"))?;
    let status = attached
        .take_status()
        .ok_or_else(|| missing_stream(name, "status"))?;

    let raw_mode = RawModeGuard::enable()?;
    let resizer = match attached.terminal_size() {
        Some(channel) if raw_mode.active => Some(tokio::spawn(forward_terminal_size(channel))),
        _ => None,
    };
    // tokio's Stdin read cannot be cancelled and would hold the runtime open
    let input = tokio::spawn(forward_input(spawn_reader(std::io::stdin())?, stdin_writer));
    let output = tokio::spawn(relay(stdout_reader, tokio::io::stdout()));

    let status = status.await;
    let output = output.await;
    input.abort();
    if let Some(resizer) = resizer {
        resizer.abort();
    }
    drop(raw_mode);

    attached.join().await.map_err(|e| Error::ExecStream {
        name: name.to_string(),
        message: e.to_string(),
    })?;

    match output {
        Ok(Ok(bytes)) => debug!("Relayed {} bytes of output", bytes),
        Ok(Err(e)) => {
            return Err(Error::ExecStream {
                name: name.to_string(),
                message: e.to_string(),
            })
        }
        Err(e) => debug!("Output relay ended early: {}", e),
    }

    check_status(name, status)?;

    info!("✓ Command successfully executed in pod '{}'", name);

    Ok(())
}

/// Interpret the status the API server sends when the remote process ends
pub fn check_status(name: &str, status: Option<Status>) -> Result<()> {
    let Some(status) = status else {
        return Ok(());
    };
    if status.status.as_deref() != Some("Failure") {
        return Ok(());
    }

    match remote_exit_code(&status) {
        Some(code) => Err(Error::RemoteExit {
            name: name.to_string(),
            code,
        }),
        None => Err(Error::ExecStream {
            name: name.to_string(),
            message: status.message.unwrap_or_else(|| "remote command failed".to_string()),
        }),
    }
}

fn remote_exit_code(status: &Status) -> Option<i32> {
    status
        .details
        .as_ref()?
        .causes
        .as_ref()?
        .iter()
        .find(|cause| cause.reason.as_deref() == Some(EXIT_CODE_CAUSE))?
        .message
        .as_deref()?
        .parse()
        .ok()
}

fn missing_stream(name: &str, stream: &str) -> Error {
    Error::ExecStream {
        name: name.to_string(),
        message: format!("{} stream was not attached", stream),
    }
}

/// Copy bytes from `reader` to `writer`, flushing after every chunk
async fn relay<R, W>(mut reader: R, mut writer: W) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            writer.flush().await?;
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        total += n as u64;
    }
}

/// Read `reader` on its own thread, sending each chunk to the returned channel
///
/// The thread is detached; when the receiver is dropped it exits on its next read.
fn spawn_reader<R>(mut reader: R) -> std::io::Result<InputChunks>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; CHUNK_SIZE];
            loop {
                let chunk = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => Ok(buf[..n].to_vec()),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => Err(e),
                };
                let failed = chunk.is_err();
                if tx.blocking_send(chunk).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Write every chunk from `input` to `writer` until the reader side ends
async fn forward_input<W>(mut input: InputChunks, mut writer: W) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    while let Some(chunk) = input.recv().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        writer.flush().await?;
        total += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(total)
}

/// Send the current terminal size, then every change of it
async fn forward_terminal_size(mut channel: Sender<TerminalSize>) -> std::io::Result<()> {
    let (width, height) = crossterm::terminal::size()?;
    if channel.send(TerminalSize { height, width }).await.is_err() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sig = signal(SignalKind::window_change())?;
        while sig.recv().await.is_some() {
            let (width, height) = crossterm::terminal::size()?;
            if channel.send(TerminalSize { height, width }).await.is_err() {
                break;
            }
        }
    }

    Ok(())
}

/// Raw mode on the local terminal for as long as the guard lives
struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    fn enable() -> Result<Self> {
        if !std::io::stdin().is_terminal() {
            return Ok(Self { active: false });
        }
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self { active: true })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = crossterm::terminal::disable_raw_mode() {
                warn!("Failed to restore terminal from raw mode: {}", e);
            }
        }
    }
}
