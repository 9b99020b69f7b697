use anyhow::{Context, Result};
use rim_core::{EncodeOptions, RimConfig, yaml_to_cbor};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub enum Output {
    Stdout,
    File(PathBuf),
}

pub fn load_config(path: Option<&Path>) -> Result<RimConfig> {
    let Some(path) = path else {
        return Ok(RimConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = RimConfig::from_toml_str(&content)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    debug!(path = %path.display(), ?config, "loaded config");
    Ok(config)
}

/// Reads a YAML file and transcodes it.
pub fn encode_file(path: &Path, options: &EncodeOptions) -> Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let out = yaml_to_cbor(&data, options)
        .with_context(|| format!("failed to encode {}", path.display()))?;
    debug!(path = %path.display(), len = out.len(), "encoded yaml");
    Ok(out)
}

/// `--stdout` and `-o -` both select stdout; without `-o` the output goes
/// next to the input with its extension replaced by `.cbor`.
pub fn output_target(input: &Path, out: Option<&Path>, stdout: bool) -> Output {
    match out {
        _ if stdout => Output::Stdout,
        Some(path) if path == Path::new("-") => Output::Stdout,
        Some(path) => Output::File(path.to_path_buf()),
        None => Output::File(default_output_path(input)),
    }
}

/// Everything from the last dot of the file name on is the extension, so a
/// dotfile such as `.hidden` maps to `.cbor`.
fn default_output_path(input: &Path) -> PathBuf {
    match (input.file_name(), input.extension()) {
        (Some(name), None) if name.as_encoded_bytes().starts_with(b".") => {
            input.with_file_name(".cbor")
        }
        _ => input.with_extension("cbor"),
    }
}

pub fn write_output(target: &Output, bytes: &[u8]) -> Result<()> {
    match target {
        Output::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("failed to write to stdout")?;
            stdout.flush().context("failed to write to stdout")?;
        }
        Output::File(path) => {
            fs::write(path, bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }
    Ok(())
}
