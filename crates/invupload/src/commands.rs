//! Subcommand implementations

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::time::Duration;

use eyre::{Result, WrapErr, bail};
use invupload_exec::{ShellProcess, TracingProgress};
use invupload_report::{SliceGenerator, WriterSink, load_hosts};
use tracing::info;

use crate::config::Config;

/// Render the hosts in `hosts_path` as a single slice
pub fn generate(
    config: &Config,
    hosts_path: &Path,
    slice_id: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let hosts = load_hosts(hosts_path)?;
    let organizations = config.organizations();

    let mut generator = SliceGenerator::new(hosts, &config.report, &organizations);
    if let Some(id) = slice_id {
        generator = generator.with_slice_id(id);
    }

    match output {
        Some(path) => {
            let written = generator.render_to_file(path)?;
            info!(path = %path.display(), bytes = written, "slice written");
        }
        None => {
            let sink = generator.render_into(WriterSink::new(io::stdout().lock()));
            sink.finish().wrap_err("failed to write slice to stdout")?;
        }
    }

    info!(
        slice_id = generator.slice_id(),
        hosts_count = generator.hosts_count(),
        "generated report slice"
    );
    Ok(())
}

/// Run `command`, logging its output as it arrives
pub async fn run(
    label: &str,
    command: Vec<String>,
    env: Vec<(String, String)>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let mut process = ShellProcess::new(command).with_env(env.into_iter().collect::<HashMap<_, _>>());
    if let Some(secs) = timeout_secs {
        process = process.with_timeout(Duration::from_secs(secs));
    }

    let outcome = process.run(label, &TracingProgress).await?;
    if !outcome.success() {
        bail!("command failed: {}", outcome.status);
    }
    Ok(())
}

/// Parse a `KEY=VALUE` argument
pub fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty variable name in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
