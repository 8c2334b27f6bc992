use anyhow::{anyhow, Context, Result};
mod cli;
use clap::Parser;
mod config;
mod error;
mod exporter;
mod ids;
mod importer;
mod schema;
mod shard;
mod state;
mod transport;
mod validator;

use cli::{Cli, Commands};
use config::Config;
use exporter::Exporter;
use ids::IdGenerator;
use importer::Importer;
use serde_json::Value;
use shard::ShardSet;
use std::fs;
use std::path::{Path, PathBuf};
use transport::HttpTransport;
use validator::SchemaValidator;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Cli::parse();
    let config_path = args.config.as_deref();
    match args.command {
        Commands::Configure {} => {
            Config::configure(config_path)?;
        }
        Commands::Export { env, path } => {
            let cfg = Config::load(config_path)?;
            let environment = cfg.get_env(&env)?;
            let target = environment.target()?;
            let transport = HttpTransport::new(environment.endpoint.as_str())?;
            let cwd = std::env::current_dir()?;

            Exporter::new(&path, &cwd, &transport).download(&target)?;
            println!(
                "Exported {}@{} to {}",
                target.service,
                target.stage,
                path.display()
            );
        }
        Commands::Import { env, data, schema } => {
            let cfg = Config::load(config_path)?;
            let environment = cfg.get_env(&env)?;
            let schema_path = schema
                .or_else(|| environment.datamodel.as_ref().map(PathBuf::from))
                .ok_or_else(|| {
                    anyhow!(
                        "No datamodel given; pass --schema or set `datamodel` for environment '{}'",
                        env
                    )
                })?;
            let types = read_schema(&schema_path)?;
            let target = environment.target()?;
            let transport = HttpTransport::new(environment.endpoint.as_str())?;
            let cwd = std::env::current_dir()?;

            Importer::new(&data, &types, &cwd, &transport)?.upload(&target)?;
            println!("Imported {} into {}@{}", data.display(), target.service, target.stage);
        }
        Commands::Validate { schema, paths } => {
            let validator = SchemaValidator::new(&read_schema(&schema)?)?;
            let count = validate_paths(&validator, &paths)?;
            println!("{} shard file(s) valid", count);
        }
        Commands::GenerateIds { files, out } => {
            let generator = match out {
                Some(dir) => IdGenerator::with_output_dir(dir),
                None => IdGenerator::new(),
            };
            for path in generator.generate_missing_ids(&files)? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

fn read_schema(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read datamodel {}", path.display()))
}

/// Validates shard files and bundle directories, failing on the first invalid file.
fn validate_paths(validator: &SchemaValidator, paths: &[PathBuf]) -> Result<usize> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(ShardSet::discover(path)?.iter().map(|(_, p)| p.clone()));
        } else {
            files.push(path.clone());
        }
    }

    for file in &files {
        let content = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let json: Value =
            serde_json::from_str(&content).map_err(|e| error::Error::shard_parse(file, e))?;
        validator
            .validate_import_data(&json)
            .with_context(|| format!("{} is invalid", file.display()))?;
        println!("OK {}", file.display());
    }
    Ok(files.len())
}
