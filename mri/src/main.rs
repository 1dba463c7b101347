use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use mri_anvil::Region;
use mri_convert::{ConvertOptions, Converter, error_chain};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "mri", about = "Recompress legacy Anvil region files into compact MRI archives")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert every .mca file in a directory, deleting each source once its archive is safe
    Convert {
        dir: PathBuf,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long, env = "MRI_JOBS", default_value = "0")]
        jobs: usize,

        /// Gzip level of the archives
        #[arg(short, long, env = "MRI_LEVEL", default_value = "6", value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,

        /// Skip reading each archive back before deleting its source
        #[arg(long)]
        no_verify: bool,

        /// Replace archives that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// Print what a region file or archive contains
    Inspect {
        file: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct Inspection {
    path: PathBuf,
    format: &'static str,
    chunks: usize,
    sections: usize,
    arrays: BTreeMap<&'static str, usize>,
    coordinates: Vec<ChunkInfo>,
}

#[derive(Debug, Serialize)]
struct ChunkInfo {
    x: usize,
    z: usize,
    sections: Vec<usize>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Convert { dir, jobs, level, no_verify, overwrite } => {
            let options = ConvertOptions { jobs, level, verify: !no_verify, overwrite };
            let converter = Converter::new(options);
            let report = converter
                .convert(&dir)
                .with_context(|| format!("Could not convert {}", dir.display()))?;

            for (source, archive) in &report.converted {
                println!("{} -> {}", source.display(), archive.display());
            }
            for (source, err) in &report.failed {
                eprintln!("FAILED {}: {}", source.display(), error_chain(err));
            }
            println!("\n{}", converter.metrics().generate_report());

            if !report.is_success() {
                std::process::exit(1);
            }
        }
        Command::Inspect { file, json } => {
            let inspection = inspect(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&inspection)?);
            } else {
                print_inspection(&inspection);
            }
        }
    }
    Ok(())
}

fn inspect(path: &Path) -> anyhow::Result<Inspection> {
    let bytes = std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;

    let (format, region) = if mri_archive::is_archive(&bytes) {
        let region = mri_archive::from_bytes(&bytes)
            .with_context(|| format!("{} is not a valid archive", path.display()))?;
        ("archive", region)
    } else {
        let region = mri_anvil::parse(&bytes)
            .with_context(|| format!("{} is not a valid region file", path.display()))?;
        ("region", region)
    };
    log::debug!("Inspected {} as {}", path.display(), format);

    Ok(describe(path, format, &region))
}

fn describe(path: &Path, format: &'static str, region: &Region) -> Inspection {
    let summary = region.summary();
    Inspection {
        path: path.to_path_buf(),
        format,
        chunks: summary.chunks,
        sections: summary.sections,
        arrays: summary.array_counts().collect(),
        coordinates: region
            .chunks()
            .map(|((x, z), chunk)| ChunkInfo {
                x,
                z,
                sections: chunk.sections().map(|(y, _)| y).collect(),
            })
            .collect(),
    }
}

fn print_inspection(inspection: &Inspection) {
    println!("{} ({})", inspection.path.display(), inspection.format);
    println!("  Chunks: {}", inspection.chunks);
    println!("  Sections: {}", inspection.sections);
    for (name, count) in &inspection.arrays {
        println!("  {name}: {count}");
    }
}
