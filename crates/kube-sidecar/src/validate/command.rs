//! External syntax-check commands.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use crate::error::ValidateError;

/// Environment variable carrying the path of the file under check.
pub const CHECK_FILE_ENV: &str = "SIDECAR_CHECK_FILE";

/// Splits a command line into arguments.
///
/// Whitespace separates arguments, single or double quotes group them and a
/// backslash outside quotes takes the next character literally.
pub fn parse_command_line(command: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            } else {
                current.push(c);
            }
            continue;
        }

        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_arg = true;
            }
            '"' | '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            ' ' | '\t' => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            _ => {
                current.push(c);
                in_arg = true;
            }
        }
    }

    if quote.is_some() {
        return Err(format!("Unclosed quote in command line: {}", command));
    }
    if in_arg {
        args.push(current);
    }

    Ok(args)
}

/// Runs a command against a temporary copy of the output and checks its
/// exit code against an allow-list.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    args: Vec<String>,
    tmp_directory: PathBuf,
    ok_exit_codes: Vec<i32>,
    timeout: Duration,
}

impl CommandCheck {
    pub fn new(
        command: &str,
        tmp_directory: impl Into<PathBuf>,
        ok_exit_codes: Vec<i32>,
        timeout: Duration,
    ) -> Result<Self, String> {
        let args = parse_command_line(command)?;
        if args.is_empty() {
            return Err("command is blank".to_string());
        }
        Ok(Self {
            args,
            tmp_directory: tmp_directory.into(),
            ok_exit_codes,
            timeout,
        })
    }

    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    /// Where the output is written before the command runs.
    pub fn check_path(&self, file_name: &str) -> PathBuf {
        self.tmp_directory.join(file_name)
    }

    /// Returns true when the command accepted `output`.
    ///
    /// The temporary file is removed whatever the outcome.
    pub async fn check(&self, output: &str, file_name: &str) -> Result<bool, ValidateError> {
        let path = self.check_path(file_name);
        write_check_file(&path, output).await?;

        let result = self.run(&path).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::warn!("Could not remove check file {}: {}", path.display(), e);
        }

        let code = result?;
        let accepted = self.ok_exit_codes.contains(&code);
        log::debug!(
            "Check command '{}' exited with {} (accepted: {:?})",
            self.program(),
            code,
            self.ok_exit_codes
        );
        Ok(accepted)
    }

    async fn run(&self, path: &Path) -> Result<i32, ValidateError> {
        let program = self.program().to_string();
        let mut command = tokio::process::Command::new(&program);
        command
            .args(self.args.iter().skip(1))
            .env(CHECK_FILE_ENV, path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        log::debug!("Command: {:?}", self.args);
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ValidateError::Timeout {
                program: program.clone(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| ValidateError::Spawn {
                program: program.clone(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.is_empty() {
            log::debug!("StdOut: {}", stdout);
        } else {
            log::info!("StdOut: {}", stdout);
            log::info!("ErrOut: {}", stderr);
        }

        output.status.code().ok_or(ValidateError::Signalled(program))
    }
}

async fn write_check_file(path: &Path, output: &str) -> Result<(), ValidateError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ValidateError::WriteCheckFile {
                path: path.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::write(path, output)
        .await
        .map_err(|e| ValidateError::WriteCheckFile {
            path: path.to_path_buf(),
            source: e,
        })
}
