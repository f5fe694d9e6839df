use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_info};
use tokio::process::Command;

use crate::convert::{ConversionStrategy, ConvertError};

const INPUT: &str = "{input}";
const OUTPUT: &str = "{output}";
const OUTPUT_NAME: &str = "{output_name}";

/// A delegated converter invoked as a child process.
///
/// Arguments are templates: `{input}` and `{output}` expand to full paths,
/// `{output_name}` to the output's file name. The process runs in the output's
/// directory, is killed when its timeout elapses and succeeds only on one of
/// the accepted exit codes.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    label: String,
    candidates: Vec<String>,
    args: Vec<String>,
    accepted_exit_codes: Vec<i32>,
    timeout: Duration,
}

impl ExternalTool {
    pub fn new(program: impl Into<String>, args: &[&str], timeout: Duration) -> Self {
        let program = program.into();
        Self {
            label: program.clone(),
            candidates: vec![program],
            args: args.iter().map(|a| a.to_string()).collect(),
            accepted_exit_codes: vec![0],
            timeout,
        }
    }

    /// Try each program name in order; the first one found on `PATH` is used.
    pub fn any_of(
        label: impl Into<String>,
        candidates: Vec<String>,
        args: &[&str],
        timeout: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            candidates,
            args: args.iter().map(|a| a.to_string()).collect(),
            accepted_exit_codes: vec![0],
            timeout,
        }
    }

    pub fn accept_exit_codes(mut self, codes: &[i32]) -> Self {
        self.accepted_exit_codes = codes.to_vec();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn locate(&self) -> Option<PathBuf> {
        self.candidates
            .iter()
            .find_map(|candidate| which::which(candidate).ok())
    }

    fn expand_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let output_name = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT, &input.to_string_lossy())
                    .replace(OUTPUT_NAME, &output_name)
                    .replace(OUTPUT, &output.to_string_lossy())
            })
            .collect()
    }

    pub async fn run(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let program = self
            .locate()
            .ok_or_else(|| ConvertError::ToolMissing(self.label.clone()))?;
        let args = self.expand_args(input, output);
        engine_debug!("Running {} {:?}", program.display(), args);

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        let child = command.spawn()?;
        let finished = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ConvertError::Timeout {
                tool: self.label.clone(),
                secs: self.timeout.as_secs(),
            })??;

        let code = finished.status.code();
        match code {
            Some(code) if self.accepted_exit_codes.contains(&code) => {
                if code != 0 {
                    engine_info!("{} finished with warnings (exit code {})", self.label, code);
                }
                Ok(())
            }
            _ => Err(ConvertError::Failed {
                tool: self.label.clone(),
                code,
                stderr: String::from_utf8_lossy(&finished.stderr).trim().to_string(),
            }),
        }
    }
}

#[async_trait]
impl ConversionStrategy for ExternalTool {
    fn name(&self) -> &str {
        &self.label
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        self.run(input, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_expand_to_paths_and_names() {
        let tool = ExternalTool::new("kindlegen", &["{input}", "-o", "{output_name}"], Duration::from_secs(1));
        let args = tool.expand_args(Path::new("/out/a b.html"), Path::new("/out/a b.mobi"));
        assert_eq!(args, ["/out/a b.html", "-o", "a b.mobi"]);

        let tool = ExternalTool::new("chrome", &["--print-to-pdf={output}", "{input}"], Duration::from_secs(1));
        let args = tool.expand_args(Path::new("/o/x.html"), Path::new("/o/x.pdf"));
        assert_eq!(args, ["--print-to-pdf=/o/x.pdf", "/o/x.html"]);
    }

    #[tokio::test]
    async fn missing_program_is_reported_as_missing() {
        let tool = ExternalTool::new("courier-no-such-tool-xyz", &[], Duration::from_secs(1));
        let err = tool.run(Path::new("in.html"), Path::new("out.pdf")).await.unwrap_err();
        assert!(matches!(err, ConvertError::ToolMissing(name) if name == "courier-no-such-tool-xyz"));
    }
}
