use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use ossfs::{
    adapters::s3::{ConnectSettings, S3Client},
    model::{
        fs::{Config, Visibility, CONFIG_CONTENT_TYPE},
        oss::Options,
    },
    Filesystem, ObjectFS,
};
use serde::Serialize;
use tracing::{error, info, span, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ossfs", version, about = "Filesystem-style access to an OSS bucket")]
struct Cli {
    #[arg(long, env = "OSS_BUCKET")]
    bucket: String,

    /// S3-compatible endpoint, e.g. https://oss-cn-hangzhou.aliyuncs.com
    #[arg(long, env = "OSS_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, env = "OSS_REGION", default_value = "oss-cn-hangzhou")]
    region: String,

    #[arg(long, env = "OSS_PREFIX", default_value = "")]
    prefix: String,

    #[arg(long)]
    path_style: bool,

    /// Request header sent with every call, as NAME=VALUE.
    #[arg(long = "option", value_parser = parse_option)]
    options: Vec<(String, String)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Exists {
        path: String,
    },
    Cat {
        path: String,
    },
    Ls {
        #[arg(default_value = "")]
        directory: String,
        #[arg(short, long)]
        recursive: bool,
    },
    Stat {
        path: String,
    },
    Put {
        path: String,
        file: PathBuf,
        #[arg(long)]
        content_type: Option<String>,
    },
    Cp {
        path: String,
        newpath: String,
    },
    Mv {
        path: String,
        newpath: String,
    },
    Rm {
        path: String,
    },
    Mkdir {
        dirname: String,
    },
    Rmdir {
        dirname: String,
    },
    GetAcl {
        path: String,
    },
    SetAcl {
        path: String,
        visibility: Visibility,
    },
}

#[derive(Serialize)]
struct VisibilityOutput {
    visibility: Visibility,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let cli = Cli::parse();
    info!(bucket = %cli.bucket, prefix = %cli.prefix, "args");

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error_message = %format!("{:#}", err), error_group = "run");
            eprintln!("ossfs: {:#}", err);
            ExitCode::from(2)
        }
    }
}

/// Returns `false` when the target was missing or the operation degraded.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let settings = ConnectSettings {
        endpoint: cli.endpoint,
        region: cli.region,
        force_path_style: cli.path_style,
    };
    let client = S3Client::connect(&settings).context("failed to connect")?;

    let options: Options = cli.options.into_iter().collect();
    let fs = ObjectFS::new(Arc::new(client), &cli.bucket, &cli.prefix, options);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::Exists { path } => {
            let found = fs.has(&path)?;
            print_json(&mut stdout, &found)?;
            Ok(found)
        }
        Command::Cat { path } => match fs.read(&path)? {
            None => Ok(false),
            Some(file) => {
                stdout.write_all(&file.contents.unwrap_or_default())?;
                Ok(true)
            }
        },
        Command::Ls {
            directory,
            recursive,
        } => {
            for entry in fs.list_contents(&directory, recursive)? {
                print_json(&mut stdout, &entry)?;
            }
            Ok(true)
        }
        Command::Stat { path } => print_found(&mut stdout, fs.get_metadata(&path)?),
        Command::Put {
            path,
            file,
            content_type,
        } => {
            let mut config = Config::new();
            if let Some(content_type) = content_type {
                config.set(CONFIG_CONTENT_TYPE, content_type);
            }

            let mut source = File::open(&file)
                .with_context(|| format!("failed to open {}", file.display()))?;
            let info = fs.write_stream(&path, &mut source, &config)?;
            print_json(&mut stdout, &info)?;
            Ok(true)
        }
        Command::Cp { path, newpath } => Ok(fs.copy(&path, &newpath)?),
        Command::Mv { path, newpath } => Ok(fs.rename(&path, &newpath)?),
        Command::Rm { path } => Ok(fs.delete(&path)?),
        Command::Mkdir { dirname } => {
            print_found(&mut stdout, fs.create_dir(&dirname, &Config::new()))
        }
        Command::Rmdir { dirname } => Ok(fs.delete_dir(&dirname)?),
        Command::GetAcl { path } => print_found(
            &mut stdout,
            fs.get_visibility(&path)?
                .map(|visibility| VisibilityOutput { visibility }),
        ),
        Command::SetAcl { path, visibility } => print_found(
            &mut stdout,
            fs.set_visibility(&path, visibility)
                .map(|visibility| VisibilityOutput { visibility }),
        ),
    }
}

fn print_json<T: Serialize>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn print_found<T: Serialize>(out: &mut impl Write, value: Option<T>) -> anyhow::Result<bool> {
    match value {
        None => Ok(false),
        Some(value) => {
            print_json(out, &value)?;
            Ok(true)
        }
    }
}

fn parse_option(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("invalid option `{}`, expected NAME=VALUE", s))
}
