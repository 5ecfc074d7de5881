use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::handler::{JobContext, JobHandler};

/// Environment variable carrying the job payload as JSON
pub const PAYLOAD_ENV: &str = "JOB_PAYLOAD";

/// Runs an external command per job.
///
/// The payload JSON is exported as `JOB_PAYLOAD` and written to stdin. A
/// non-zero exit fails the job with the command's stderr as the message.
#[derive(Debug, Clone)]
pub struct ShellHandler {
    command: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env_vars: HashMap<String, String>,
}

impl ShellHandler {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            working_dir: None,
            env_vars: HashMap::new(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl JobHandler for ShellHandler {
    async fn handle(&self, ctx: &JobContext) -> anyhow::Result<()> {
        let start_time = Instant::now();
        let payload = serde_json::to_string(ctx.payload().unwrap_or(&serde_json::Value::Null))?;

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .env(PAYLOAD_ENV, &payload)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(job) = ctx.job() {
            cmd.env("JOB_ID", job.id.to_string()).env("JOB_KIND", &job.kind);
        }
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        debug!("Running {} {:?}", self.command, self.args);
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to start {}", self.command))?;

        let stdin = child.stdin.take();
        let feed_payload = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(payload.as_bytes()).await {
                // The command is free to ignore its input
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };

        let (fed, output) = tokio::join!(feed_payload, child.wait_with_output());
        let output = output.with_context(|| format!("failed to wait for {}", self.command))?;
        fed.context("failed to write payload to stdin")?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !stdout.is_empty() {
            ctx.logger().info(&stdout).await?;
        }

        info!(
            "{} exited with {} after {}ms",
            self.command,
            output.status,
            start_time.elapsed().as_millis()
        );

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Err(anyhow!("{} failed: {}", self.command, output.status))
        } else {
            Err(anyhow!(stderr))
        }
    }
}
