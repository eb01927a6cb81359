//! vfio - inspect and manage extent-based seismic datasets

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use seisvfio::{DatasetBuilder, DatasetConfig, StreamKind, VirtualFolders};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "vfio")]
#[command(about = "Manage extent storage of seismic datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Target {
    /// Dataset directory (holds the metadata files)
    #[arg(short = 'p', long)]
    path: PathBuf,

    /// Folder specs `path[,ATTRIBUTE]`; overrides the persisted folder list
    #[arg(short = 'f', long = "folder")]
    folders: Vec<String>,
}

impl Target {
    fn builder(&self) -> DatasetBuilder {
        DatasetBuilder::new(&self.path).folders(self.folders.iter().cloned())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out a new dataset
    Create {
        #[command(flatten)]
        target: Target,

        /// TOML dataset configuration
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Trace stream length in bytes
        #[arg(long)]
        trace_bytes: Option<u64>,

        /// Bytes per trace frame
        #[arg(long)]
        trace_frame: Option<u64>,

        /// Header stream length in bytes
        #[arg(long)]
        header_bytes: Option<u64>,

        /// Bytes per header frame
        #[arg(long)]
        header_frame: Option<u64>,

        /// Extents per stream
        #[arg(short = 'n', long)]
        extents: Option<u64>,
    },

    /// Print the recovered extent tables
    Inspect {
        #[command(flatten)]
        target: Target,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Scan the folders for extent files
    Scan {
        #[command(flatten)]
        target: Target,
    },

    /// Delete every extent, folder and the dataset directory
    Wipe {
        #[command(flatten)]
        target: Target,

        /// Required to actually delete
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Create {
            target,
            config,
            trace_bytes,
            trace_frame,
            header_bytes,
            header_frame,
            extents,
        } => {
            let mut cfg = match config {
                Some(file) => DatasetConfig::from_file(&file)
                    .with_context(|| format!("reading {}", file.display()))?,
                None => DatasetConfig::default(),
            };
            if let Some(v) = trace_bytes {
                cfg.trace_length = v;
            }
            if let Some(v) = trace_frame {
                cfg.trace_frame_bytes = v;
            }
            if let Some(v) = header_bytes {
                cfg.header_length = v;
            }
            if let Some(v) = header_frame {
                cfg.header_frame_bytes = v;
            }
            if extents.is_some() {
                cfg.num_extents = extents;
            }

            let dataset = target.builder().config(cfg).create()?;
            info!("Created {}", dataset.path().display());
            dataset.close()?;
        }

        Command::Inspect { target, json } => {
            let dataset = target.builder().open()?;
            if json {
                let streams: Vec<_> = StreamKind::ALL
                    .iter()
                    .map(|&kind| {
                        let list = dataset.extents(kind);
                        serde_json::json!({
                            "stream": kind,
                            "base_name": list.base_name(),
                            "num_extents": list.num_extents(),
                            "extent_size": list.extent_size(),
                            "max_file_position": list.max_file_position(),
                            "disk_usage": list.disk_usage(),
                            "entries": list.entries(),
                        })
                    })
                    .collect();
                let folders: Vec<String> =
                    dataset.folders().iter().map(|f| f.to_string()).collect();
                let report = serde_json::json!({
                    "path": dataset.path(),
                    "folders": folders,
                    "streams": streams,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Dataset {}", dataset.path().display());
                for folder in dataset.folders() {
                    println!("  folder {}", folder);
                }
                for kind in StreamKind::ALL {
                    let list = dataset.extents(kind);
                    println!(
                        "{}: {} extents x {} bytes, {} logical bytes, {} on disk",
                        kind,
                        list.num_extents(),
                        list.extent_size(),
                        list.max_file_position(),
                        list.disk_usage()
                    );
                    for entry in list.entries() {
                        println!(
                            "  {:>6} {:>16} {:>12}  {}",
                            entry.index(),
                            entry.start_offset(),
                            entry.size(),
                            entry.path().display()
                        );
                    }
                }
            }
            dataset.close()?;
        }

        Command::Scan { target } => {
            let mut folders = if target.folders.is_empty() {
                let mut loaded = VirtualFolders::new();
                loaded.load(&target.path)?;
                loaded
            } else {
                VirtualFolders::from_paths(&target.folders)
            };
            folders.find_extents()?;
            for kind in StreamKind::ALL {
                let found = folders.precomputed_extents(kind.base_name()).unwrap_or(&[]);
                println!("{}: {} files", kind, found.len());
                for path in found {
                    println!("  {}", path.display());
                }
            }
        }

        Command::Wipe { target, yes } => {
            if !yes {
                bail!("refusing to wipe {} without --yes", target.path.display());
            }
            let dataset = target.builder().open()?;
            dataset.delete()?;
            info!("Wiped {}", target.path.display());
        }
    }

    Ok(())
}
