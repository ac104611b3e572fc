use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use weightmap::{
    LogLevel, ResultExt, init_logging,
    settings::{Settings, load_settings, save_settings},
    weights::{
        RemapRequest, WeightCheck, check_weights_file, read_weight_file, remap_weights,
        write_weight_file,
    },
};

/// Inspect, check and remap skin weight files.
#[derive(Parser)]
#[command(name = "weightmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Minimum level of diagnostics printed to stderr
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Settings file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the joints a weight file references
    Joints {
        file: PathBuf,

        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare a weight file against the joints of a live binding
    Check {
        file: PathBuf,

        /// Joints currently driving the binding, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        live: Vec<String>,

        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Move weights between joints and write the rewritten file
    Remap {
        file: PathBuf,

        /// Joint pair; SOURCE=SOURCE empties the joint instead
        #[arg(long = "map", value_name = "SOURCE=TARGET", required = true)]
        pairs: Vec<String>,

        /// Output path (default: staging directory from settings)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-serialize a weight file, recomputing layers, sizes and max index
    Rewrite {
        file: PathBuf,

        /// Output path (default: overwrite the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write default settings to a JSON file
    Settings { path: PathBuf },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Joints { file, json } => {
            let check = check_weights_file(&file, None)?;
            print_check(&check, json)?;
        }
        Command::Check { file, live, json } => {
            let check = check_weights_file(&file, Some(live.as_slice()))?;
            print_check(&check, json)?;
        }
        Command::Remap {
            file,
            pairs,
            output,
        } => {
            let request = parse_pairs(&pairs)?;
            let output = match output {
                Some(output) => output,
                None => staged_output(&settings, &file)?,
            };
            let written = remap_weights(&file, &request, Some(&output))
                .log_error(Some("remap failed"))?;
            println!("{}", written.display());
        }
        Command::Rewrite { file, output } => {
            let weights = read_weight_file(&file)?;
            let target = output.unwrap_or_else(|| file.clone());
            let written = write_weight_file(&weights, &target)?;
            println!("{}", written.display());
        }
        Command::Settings { path } => {
            save_settings(&path, &Settings::default())?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn parse_pairs(pairs: &[String]) -> Result<RemapRequest> {
    let mut request = RemapRequest::default();
    for pair in pairs {
        let Some((source, target)) = pair.split_once('=') else {
            bail!("joint pair '{pair}' is not of the form SOURCE=TARGET");
        };
        request.push(source.trim(), target.trim())?;
    }
    Ok(request)
}

fn staged_output(settings: &Settings, file: &Path) -> Result<PathBuf> {
    let dir = settings.import.staging_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create staging directory: {}", dir.display()))?;
    let name = file
        .file_name()
        .with_context(|| format!("{} does not name a file", file.display()))?;
    Ok(dir.join(name))
}

fn print_check(check: &WeightCheck, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(check).context("failed to serialize check result")?
        );
        return Ok(());
    }

    match check {
        WeightCheck::Referenced(joints) => {
            for joint in joints {
                println!("{joint}");
            }
        }
        WeightCheck::Compared(mismatch) => {
            if mismatch.is_consistent() {
                println!("File and binding reference the same joints.");
            }
            for joint in &mismatch.missing_from_live {
                println!("missing from binding: {joint}");
            }
            for joint in &mismatch.missing_from_file {
                println!("missing from file: {joint}");
            }
        }
    }
    Ok(())
}
