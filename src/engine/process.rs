use crate::error::{Result, StudioError};
use crate::util::CancelFlag;
use log::{debug, info};
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

const STDERR_TAIL: usize = 800;

/// Runs `program args..` to completion, feeding `stdin` when given, and returns its stdout.
///
/// A missing binary, a non-zero exit or a cancellation while it ran all surface as `CollaboratorFailure`.
pub fn run_collaborator(
    program: &str,
    args: &[String],
    stdin: Option<&str>,
    cancel: &CancelFlag,
) -> Result<String> {
    cancel.check(program)?;
    info!("Running `{} {}`..!", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| StudioError::CollaboratorFailure(format!("could not start `{}`: {}", program, e)))?;

    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => {
            let input = input.to_string();
            Some(thread::spawn(move || pipe.write_all(input.as_bytes())))
        }
        _ => None,
    };

    let output = child
        .wait_with_output()
        .map_err(|e| StudioError::CollaboratorFailure(format!("`{}` could not be awaited: {}", program, e)))?;

    if let Some(handle) = writer {
        match handle.join() {
            Ok(Err(e)) => debug!("Writing stdin to `{}` failed: {}", program, e),
            Err(_) => debug!("stdin writer for `{}` panicked", program),
            Ok(Ok(())) => {}
        }
    }

    if cancel.is_cancelled() {
        return Err(StudioError::CollaboratorFailure(format!("`{}` interrupted", program)));
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail_start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL)
            .map(|(i, _)| i)
            .unwrap_or(0);

        return Err(StudioError::CollaboratorFailure(format!(
            "`{}` exited with {}: {}",
            program,
            output.status,
            stderr[tail_start..].trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Splits a configured `[program, args..]` command line.
pub fn split_command(command: &[String]) -> Result<(&str, &[String])> {
    match command.split_first() {
        Some((program, args)) if !program.trim().is_empty() => Ok((program.as_str(), args)),
        _ => Err(StudioError::MissingInput("collaborator command is empty".into())),
    }
}
