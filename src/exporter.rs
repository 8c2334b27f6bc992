use crate::error::{Error, Result};
use crate::shard::{list_shards, shard_file_name, Category, ShardDocument};
use crate::transport::{ExportCursor, ExportRequest, ServiceTarget, Transport};
use colored::Colorize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const EXPORT_DIR: &str = ".export";

/// Pulls every category of a service into shard files and zips them.
pub struct Exporter<'a, T: Transport> {
    transport: &'a T,
    export_path: PathBuf,
    export_dir: PathBuf,
}

impl<'a, T: Transport> Exporter<'a, T> {
    /// `work_root` hosts the temporary `.export` directory.
    pub fn new<P: Into<PathBuf>>(export_path: P, work_root: &Path, transport: &'a T) -> Self {
        Exporter {
            transport,
            export_path: export_path.into(),
            export_dir: work_root.join(EXPORT_DIR),
        }
    }

    pub fn download(&self, target: &ServiceTarget) -> Result<()> {
        self.make_dirs()?;
        for category in Category::ORDERED {
            self.download_files(category, target)?;
        }
        self.zip_it()?;
        fs::remove_dir_all(&self.export_dir)?;
        Ok(())
    }

    fn make_dirs(&self) -> Result<()> {
        if self.export_dir.exists() {
            fs::remove_dir_all(&self.export_dir)?;
        }
        for category in Category::ORDERED {
            fs::create_dir_all(self.export_dir.join(category.as_str()))?;
        }
        Ok(())
    }

    /// Requests pages until the server hands back an exhausted cursor.
    /// Returns the number of shards written.
    fn download_files(&self, category: Category, target: &ServiceTarget) -> Result<u64> {
        let before = Instant::now();
        println!("Downloading {}...", category);

        let files_dir = self.export_dir.join(category.as_str());
        let mut cursor = ExportCursor::default();
        let mut count = 1;
        while !cursor.is_exhausted() {
            let request = serde_json::to_string(&ExportRequest {
                file_type: category,
                cursor,
            })?;
            let response = self.transport.download(target, &request)?;
            log::debug!(
                "{} page {}: {} elements, cursor {:?}",
                category,
                count,
                response.out.json_elements.len(),
                response.cursor
            );

            if let Some(errors) = response.error_text() {
                return Err(Error::ExportRejected(errors));
            }

            let document = ShardDocument {
                value_type: category,
                values: response.out.json_elements,
            };
            fs::write(
                files_dir.join(shard_file_name(count)),
                serde_json::to_string(&document)?,
            )?;

            cursor = response.cursor.ok_or_else(|| {
                Error::MalformedResponse(format!("{} page {} carries no cursor", category, count))
            })?;
            count += 1;
        }

        println!(
            "Downloading {} done {}",
            category,
            format!("{}ms", before.elapsed().as_millis()).cyan()
        );
        Ok(count - 1)
    }

    fn zip_it(&self) -> Result<()> {
        let before = Instant::now();
        println!("Zipping export...");

        let mut zip = ZipWriter::new(File::create(&self.export_path)?);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for category in Category::ORDERED {
            zip.add_directory(format!("{}/", category), options)?;
            for shard in list_shards(&self.export_dir.join(category.as_str()))? {
                let name = shard
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                zip.start_file(format!("{}/{}", category, name), options)?;
                io::copy(&mut File::open(&shard)?, &mut zip)?;
            }
        }
        zip.finish()?;

        let bytes = fs::metadata(&self.export_path)?.len();
        println!(
            "{} total bytes, zipped in {}",
            bytes,
            format!("{}ms", before.elapsed().as_millis()).cyan()
        );
        Ok(())
    }
}
