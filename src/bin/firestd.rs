//! firestd - command-line interface for standardized container files

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::json;

use firestd::api::StdFiles;
use firestd::canonical::sorted_value;
use firestd::container::file::EXTENSION;
use firestd::seal::load_sealed;
use firestd::signing::{Ed25519Signer, IssueRequest, KeyringDir, Signer};
use firestd::standard::header::{check_version, ATTR_IO_VERSION};
use firestd::standard::reduce::collect_inputs_for;
use firestd::{Config, LogLevel};

const EXIT_CONFLICTS: i32 = 2;
const EXIT_INVALID_CERTIFICATES: i32 = 3;
const EXIT_BAD_SEAL: i32 = 4;

#[derive(Parser)]
#[command(name = "firestd")]
#[command(about = "Standardized fire-science container files: digests, certificates, seals and merging", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new standard file
    Create {
        /// File to create
        path: PathBuf,
        /// Author list, e.g. "alice;bob;"
        #[arg(long)]
        authors: String,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
        /// Replace an existing file
        #[arg(long)]
        overwrite: bool,
    },

    /// Validate the header and check the layout version
    Check {
        /// File to check
        path: PathBuf,
    },

    /// Print the content digest
    Digest {
        /// File to digest
        path: PathBuf,
        /// Subtree to leave out (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Generate an Ed25519 signing key
    Keygen {
        /// Identity recorded with the key
        #[arg(long)]
        identity: String,
        /// Directory receiving <KEYID>.pk8 and <KEYID>.pub
        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Issue a certificate over the file's current content
    Sign {
        /// File to certify
        path: PathBuf,
        /// Certificate name
        #[arg(long)]
        name: String,
        /// Specification tag attested to
        #[arg(long)]
        spec: String,
        /// Remove existing certificates first
        #[arg(long)]
        replace: bool,
        /// PKCS#8 private key (overrides the config)
        #[arg(long)]
        key: Option<PathBuf>,
        /// Signer identity (overrides the config)
        #[arg(long)]
        identity: Option<String>,
    },

    /// Verify every stored certificate
    Verify {
        /// File to verify
        path: PathBuf,
        /// Exit with status 3 when any certificate is invalid
        #[arg(long)]
        strict: bool,
    },

    /// List conflicts between two files
    Diff {
        /// First file
        a: PathBuf,
        /// Second file
        b: PathBuf,
    },

    /// Merge files left to right into one
    Merge {
        /// Input files, in merge order
        inputs: Vec<PathBuf>,
        /// Output file
        #[arg(long)]
        out: PathBuf,
        /// Also merge every .fstd file under this directory, sorted by path
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Seal a JSON result document
    Seal {
        /// JSON object to seal
        input: PathBuf,
        /// Sealed output
        output: PathBuf,
    },

    /// Check a sealed JSON document
    VerifySeal {
        /// Sealed document
        path: PathBuf,
    },
}

fn main() {
    match run_application() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match Config::config_dir() {
            Some(dir) => dir.join("firestd.toml"),
            None => PathBuf::from("firestd.toml"),
        },
    };
    Config::load(&path).with_context(|| format!("loading config {}", path.display()))
}

fn init_logging(level: LogLevel) {
    let env = env_logger::Env::default().default_filter_or(level.to_string());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let value = serde_json::to_value(value)?;
    println!("{}", serde_json::to_string_pretty(&sorted_value(&value))?);
    Ok(())
}

fn run_application() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    let level = config.logging.level.raised_by(cli.verbose);
    if config.logging.console || cli.verbose > 0 {
        init_logging(level);
    }

    match cli.command {
        Commands::Create {
            path,
            authors,
            description,
            overwrite,
        } => {
            let api = StdFiles::new(config);
            let file = api.create(&path, &authors, description.as_deref(), overwrite)?;
            file.close()?;
            println!("{}", path.display());
        }

        Commands::Check { path } => {
            let api = StdFiles::new(config);
            let container = api.open_checked(&path)?;
            let check = check_version(&container, &api.config().version_policy())?;
            let version = container
                .attrs()
                .get(ATTR_IO_VERSION)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            print_json(&json!({
                "path": path.display().to_string(),
                "io_version": version,
                "needs_update": check.needs_update,
                "valid": true,
            }))?;
        }

        Commands::Digest { path, exclude } => {
            let api = StdFiles::new(config);
            println!("{}", api.digest(&path, &exclude)?);
        }

        Commands::Keygen { identity, out_dir } => {
            let (signer, pkcs8) = Ed25519Signer::generate(&identity)?;
            std::fs::create_dir_all(&out_dir)?;
            let key_path = out_dir.join(format!("{}.pk8", signer.key_id()));
            std::fs::write(&key_path, &pkcs8)
                .with_context(|| format!("writing {}", key_path.display()))?;
            KeyringDir::new(&out_dir).install(&signer.public_key_armored())?;
            print_json(&json!({
                "key_id": signer.key_id(),
                "identity": identity,
                "private_key": key_path.display().to_string(),
            }))?;
        }

        Commands::Sign {
            path,
            name,
            spec,
            replace,
            key,
            identity,
        } => {
            if let Some(key) = key {
                config.signing.private_key_path = Some(key.display().to_string());
            }
            if let Some(identity) = identity {
                config.signing.signer_identity = identity;
            }
            let api = StdFiles::new(config);
            let mut request = IssueRequest::new(&name, &spec);
            request.remove_previous = replace;
            let cert_id = api.sign(&path, &request)?;
            println!("{}", cert_id);
        }

        Commands::Verify { path, strict } => {
            let api = StdFiles::new(config);
            let report = api.verify_by_id(&path)?;
            print_json(&report)?;
            if strict && report.iter().any(|r| !r.valid) {
                return Ok(EXIT_INVALID_CERTIFICATES);
            }
        }

        Commands::Diff { a, b } => {
            let api = StdFiles::new(config);
            let conflicts = api.diff(&a, &b)?;
            print_json(&conflicts)?;
            if !conflicts.is_empty() {
                return Ok(EXIT_CONFLICTS);
            }
        }

        Commands::Merge { mut inputs, out, dir } => {
            if let Some(dir) = dir {
                inputs.extend(collect_inputs_for(&dir, EXTENSION, &out)?);
            }
            if inputs.is_empty() {
                bail!("no input files given");
            }
            let api = StdFiles::new(config);
            let steps = inputs.len().saturating_sub(1).max(1);
            let pb = ProgressBar::new(steps as u64);
            pb.set_style(ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} merges",
            )?);
            let result = api.merge_many_with_progress(&inputs, &out, |done, _| {
                pb.set_position(done as u64)
            });
            pb.finish_and_clear();
            let target = result?;
            println!("{}", target.display());
        }

        Commands::Seal { input, output } => {
            let api = StdFiles::new(config);
            let data = load_sealed(&input)?;
            api.seal_to(&output, &data)?;
            println!("{}", output.display());
        }

        Commands::VerifySeal { path } => {
            let api = StdFiles::new(config);
            let valid = api.verify_sealed_file(&path)?;
            print_json(&json!({ "path": path.display().to_string(), "valid": valid }))?;
            if !valid {
                return Ok(EXIT_BAD_SEAL);
            }
        }
    }

    Ok(0)
}
