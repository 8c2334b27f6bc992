use crate::error::{Error, Result};
use crate::shard::{shard_index, Category, ShardSet};
use crate::state::ImportState;
use crate::transport::{ServiceTarget, Transport};
use crate::validator::SchemaValidator;
use colored::Colorize;
use serde_json::Value;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};
use zip::ZipArchive;

pub const IMPORT_DIR: &str = ".import";
pub const STATE_FILE: &str = "state.json";

/// Validates an export bundle and uploads it shard by shard, persisting
/// progress so an interrupted import resumes where it stopped.
pub struct Importer<'a, T: Transport> {
    transport: &'a T,
    validator: SchemaValidator,
    import_path: PathBuf,
    import_dir: PathBuf,
    state_path: PathBuf,
    is_dir: bool,
}

impl<'a, T: Transport> Importer<'a, T> {
    /// `import_path` is a zip archive or an already extracted bundle
    /// directory; archives are extracted below `work_root`.
    pub fn new<P: Into<PathBuf>>(
        import_path: P,
        schema: &str,
        work_root: &Path,
        transport: &'a T,
    ) -> Result<Self> {
        let import_path = import_path.into();
        if !import_path.exists() {
            return Err(Error::ImportPathMissing(import_path.display().to_string()));
        }
        let is_dir = import_path.is_dir();
        let import_dir = if is_dir {
            import_path.clone()
        } else {
            work_root.join(IMPORT_DIR)
        };
        Ok(Importer {
            transport,
            validator: SchemaValidator::new(schema)?,
            state_path: import_dir.join(STATE_FILE),
            import_path,
            import_dir,
            is_dir,
        })
    }

    pub fn upload(&self, target: &ServiceTarget) -> Result<()> {
        let source = if self.is_dir {
            None
        } else {
            let identity = archive_identity(&self.import_path)?;
            self.discard_stale_extraction(&identity)?;
            self.unzip()?;
            Some(identity)
        };

        let before = Instant::now();
        println!("Validating data...");
        let files = ShardSet::discover(&self.import_dir)?;
        self.validate_files(&files)?;
        println!("Validating data done {}", elapsed(before));

        let mut state = ImportState::load(&self.state_path);
        state.source = source;
        for category in Category::ORDERED {
            self.upload_category(category, files.get(category), &mut state, target)?;
        }

        ImportState::default().save(&self.state_path)?;
        if !self.is_dir {
            fs::remove_dir_all(&self.import_dir)?;
        }
        Ok(())
    }

    /// A leftover extraction only carries over when it came from this very
    /// archive; anything else is wiped so its shards and state can't leak in.
    fn discard_stale_extraction(&self, identity: &str) -> Result<()> {
        if !self.import_dir.exists() {
            return Ok(());
        }
        if ImportState::load(&self.state_path).source.as_deref() == Some(identity) {
            log::info!("resuming import of {}", self.import_path.display());
            return Ok(());
        }
        log::warn!(
            "discarding {} left over from another import",
            self.import_dir.display()
        );
        fs::remove_dir_all(&self.import_dir)?;
        Ok(())
    }

    fn unzip(&self) -> Result<()> {
        let before = Instant::now();
        println!("Unzipping...");

        let mut archive = ZipArchive::new(File::open(&self.import_path)?)?;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let relative = match entry.enclosed_name() {
                Some(path) => path.to_owned(),
                None => {
                    log::warn!("skipping archive entry outside the bundle: {}", entry.name());
                    continue;
                }
            };
            let out = self.import_dir.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&out)?;
                continue;
            }
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            io::copy(&mut entry, &mut File::create(&out)?)?;
        }

        println!("Unzipping done {}", elapsed(before));
        Ok(())
    }

    /// Every shard must pass before anything is uploaded.
    fn validate_files(&self, files: &ShardSet) -> Result<()> {
        if files.is_empty() {
            return Err(Error::NoShards(self.import_dir.display().to_string()));
        }
        for (category, path) in files.iter() {
            let content = fs::read_to_string(path)?;
            let json: Value =
                serde_json::from_str(&content).map_err(|e| Error::shard_parse(path, e))?;
            log::debug!("validating {} shard {}", category, path.display());
            self.validator.validate_import_data(&json)?;
        }
        Ok(())
    }

    fn upload_category(
        &self,
        category: Category,
        files: &[PathBuf],
        state: &mut ImportState,
        target: &ServiceTarget,
    ) -> Result<()> {
        let before = Instant::now();
        println!("\nUploading {}...", category);

        for path in files {
            let index = shard_index(path);
            if state.get(category) >= index {
                println!(
                    "{}",
                    format!("Skipping file {} (already imported)", path.display()).yellow()
                );
                continue;
            }

            // Raw file text goes over the wire, not a re-serialization.
            let file = fs::read_to_string(path)?;
            let errors = self.transport.upload(target, &file)?;
            if !errors.is_empty() {
                return Err(Error::UploadRejected(serde_json::to_string_pretty(&errors)?));
            }

            state.set(category, index);
            state.save(&self.state_path)?;
        }

        println!("Uploading {} done {}", category, elapsed(before));
        Ok(())
    }
}

/// Canonical path, size and modification time of an archive.
fn archive_identity(path: &Path) -> Result<String> {
    let canonical = fs::canonicalize(path)?;
    let meta = fs::metadata(&canonical)?;
    let modified = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    Ok(format!("{}:{}:{}", canonical.display(), meta.len(), modified))
}

fn elapsed(since: Instant) -> colored::ColoredString {
    format!("{}ms", since.elapsed().as_millis()).cyan()
}
