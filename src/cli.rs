use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "prisma-data", author, version, about = "Prisma service data export, validation & import CLI (Rust)")]
pub struct Cli {
    /// Config file to use instead of prisma-data.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure service environments in prisma-data.toml
    Configure {},
    /// Export all data of <env> into a zip archive
    Export {
        /// Environment name to export (must exist in the config)
        #[arg(long)]
        env: String,
        /// Path of the zip file to write
        #[arg(short, long, default_value = "export.zip")]
        path: PathBuf,
    },
    /// Validate and upload an export archive or directory into <env>
    Import {
        #[arg(long)]
        env: String,
        /// Zip archive or directory containing nodes/, lists/ and relations/
        #[arg(short, long)]
        data: PathBuf,
        /// Datamodel (GraphQL SDL) to validate against; defaults to the environment's datamodel
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
    /// Validate shard files or bundle directories against a datamodel without uploading
    Validate {
        #[arg(short, long)]
        schema: PathBuf,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Assign ids to node records that lack one, writing patched copies
    GenerateIds {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Directory for the patched copies (defaults to a fresh temp directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}
