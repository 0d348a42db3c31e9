// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local child-process launcher

use super::{ExitInfo, LineStream, ProcessError, ProcessLauncher, SpawnedProcess};
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Launches workers as child processes of the dispatcher
#[derive(Clone, Debug, Default)]
pub struct LocalLauncher;

impl LocalLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for LocalLauncher {
    async fn launch(&self, command: &[String]) -> Result<SpawnedProcess, ProcessError> {
        let (program, args) = command.split_first().ok_or(ProcessError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Dropping `child` on the early returns below kills it
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::StreamUnavailable("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ProcessError::StreamUnavailable("stderr"))?;
        let pid = child.id();

        let exit = async move {
            let status = child.wait().await.map_err(ProcessError::Wait)?;
            Ok(ExitInfo {
                code: status.code(),
            })
        }
        .boxed();

        Ok(SpawnedProcess {
            pid,
            stdout: read_lines(stdout),
            stderr: read_lines(stderr),
            exit,
        })
    }
}

/// Split output into lines without requiring UTF-8.
///
/// Invalid bytes are replaced rather than ending the stream: a closed pipe
/// would kill the worker on its next write.
fn read_lines<R>(reader: R) -> LineStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let state = (BufReader::new(reader), Vec::new());
    futures::stream::unfold(state, |(mut reader, mut buf)| async move {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => None,
            Ok(_) => {
                let line = decode_line(&buf);
                Some((line, (reader, buf)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "worker output stream failed, discarding the rest");
                // Keep the pipe open until the worker closes it
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    tracing::debug!(error = %e, "worker output drain ended");
                }
                None
            }
        }
    })
    .boxed()
}

fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
