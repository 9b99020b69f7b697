use anyhow::Context;
use clap::{ArgAction, Parser};
use clap_verbosity_flag::InfoLevel;
use directories::ProjectDirs;
use std::path::PathBuf;

mod cmd;
mod helpers;

/// Encode a YAML RIM manifest as canonical CBOR, optionally signed as a
/// COSE_Sign1 envelope.
#[derive(Parser)]
#[command(name = "yaml2cbor", version, about, long_about = None)]
struct Cli {
    /// YAML file to encode
    input: PathBuf,

    /// Output file; "-" writes to stdout. Defaults to INPUT with the
    /// extension changed to .cbor
    #[arg(short, long, value_name = "PATH", conflicts_with = "stdout")]
    out: Option<PathBuf>,

    /// Write to standard output instead of a file
    #[arg(short = 'O', long, action = ArgAction::SetTrue)]
    stdout: bool,

    /// Signing key in JWK format. When given, the encoded input becomes the
    /// payload of a COSE_Sign1 envelope
    #[arg(short, long, value_name = "PATH")]
    signing_key: Option<PathBuf>,

    /// Content type header of the envelope [default: application/rim+cbor]
    #[arg(
        short,
        long,
        value_name = "TYPE",
        alias = "contentType",
        requires = "signing_key"
    )]
    content_type: Option<String>,

    /// YAML file encoded into the meta header of the envelope
    #[arg(short, long, value_name = "PATH", requires = "signing_key")]
    meta: Option<PathBuf>,

    /// Config file; defaults to <config dir>/rim/config.toml when present
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.tracing_level_filter())
        .with_writer(std::io::stderr)
        .init();

    // Config lives at ~/.config/rim/config.toml unless --config is given.
    let config_file = match &cli.config {
        Some(path) => Some(path.clone()),
        None => {
            let dirs = ProjectDirs::from("", "", "rim")
                .context("failed to determine config directory path")?;
            let default = dirs.config_dir().join("config.toml");
            default.exists().then_some(default)
        }
    };
    let config = helpers::load_config(config_file.as_deref())?;

    cmd::run(cli, config)
}
