use std::process::Stdio;

use tokio::process::Command;

use signal_core::config::CommandSpec;

use crate::{IoError, Result};

// ─── Output ───────────────────────────────────────────────────────────────

/// Captured output of a finished external program.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// ─── Templating ───────────────────────────────────────────────────────────

/// Substitute `{name}` placeholders in every argument of `spec`.
pub fn render_args(spec: &CommandSpec, vars: &[(&str, &str)]) -> Vec<String> {
    spec.args
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
        })
        .collect()
}

// ─── Runner ───────────────────────────────────────────────────────────────

/// Run `program args..` to completion and capture its output.
///
/// The child is killed if the returned future is dropped, so callers can
/// bound it with `tokio::time::timeout` or race it against cancellation.
/// A non-zero exit is an error carrying the captured stderr.
pub async fn run_command(program: &str, args: &[String]) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd.output().await.map_err(|source| IoError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if output.status.success() {
        return Ok(CommandOutput { stdout, stderr });
    }

    let msg = if let Some(code) = output.status.code() {
        if stderr.is_empty() {
            format!("'{program}' exited with code {code}")
        } else {
            format!("'{program}' exited with code {code}\nstderr: {stderr}")
        }
    } else if stderr.is_empty() {
        format!("'{program}' terminated by signal")
    } else {
        format!("'{program}' terminated by signal\nstderr: {stderr}")
    };

    Err(IoError::Process(msg))
}

/// Render `spec` with `vars` and run it.
pub async fn run_spec(spec: &CommandSpec, vars: &[(&str, &str)]) -> Result<CommandOutput> {
    let args = render_args(spec, vars);
    tracing::debug!(program = %spec.program, ?args, "running external command");
    run_command(&spec.program, &args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", &["-c", script])
    }

    #[test]
    fn render_args_substitutes_all_placeholders() {
        let spec = CommandSpec::new("fswebcam", &["--save", "{image}", "--title={lane}-{image}"]);
        let args = render_args(&spec, &[("image", "/tmp/a.jpg"), ("lane", "lane2")]);
        assert_eq!(args, vec!["--save", "/tmp/a.jpg", "--title=lane2-/tmp/a.jpg"]);
    }

    #[test]
    fn render_args_leaves_unknown_placeholders() {
        let spec = CommandSpec::new("x", &["{other}"]);
        assert_eq!(render_args(&spec, &[("image", "a")]), vec!["{other}"]);
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = run_spec(&sh("echo 'car: 90%'"), &[]).await.unwrap();
        assert_eq!(out.stdout.trim(), "car: 90%");
    }

    #[tokio::test]
    async fn non_zero_exit_includes_stderr() {
        let err = run_spec(&sh("echo 'no camera' >&2; exit 3"), &[])
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exited with code 3"), "{msg}");
        assert!(msg.contains("no camera"), "{msg}");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = run_command("definitely-not-installed-xyz", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, IoError::Spawn { .. }));
    }

    #[tokio::test]
    async fn dropped_future_does_not_wait_for_child() {
        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            run_spec(&sh("sleep 30"), &[]),
        )
        .await;
        assert!(result.is_err());
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
