use anyhow::{Context, Result};
use rim_core::{JwkSigningKey, RimConfig, sign};
use std::fs;
use tracing::{info, warn};

use crate::Cli;
use crate::helpers::{Output, encode_file, output_target, write_output};

pub fn run(cli: Cli, config: RimConfig) -> Result<()> {
    let options = config.encoding;
    let mut out = encode_file(&cli.input, &options)?;

    if let Some(key_path) = &cli.signing_key {
        let key_data = fs::read(key_path)
            .with_context(|| format!("failed to read signing key {}", key_path.display()))?;
        let key = JwkSigningKey::from_slice(&key_data)
            .with_context(|| format!("invalid signing key {}", key_path.display()))?;

        let meta = match &cli.meta {
            Some(path) => Some(encode_file(path, &options)?),
            None => {
                warn!("generating COSE_Sign1 envelope without -m/--meta");
                None
            }
        };
        let content_type = cli
            .content_type
            .as_deref()
            .unwrap_or(config.signing.content_type.as_str());

        out = sign(&out, meta.as_deref(), content_type, Some(&key))
            .with_context(|| format!("failed to sign with {}", key_path.display()))?;
    }

    let target = output_target(&cli.input, cli.out.as_deref(), cli.stdout);
    write_output(&target, &out)?;
    if let Output::File(path) = &target {
        info!(path = %path.display(), len = out.len(), "wrote output");
    }
    Ok(())
}
