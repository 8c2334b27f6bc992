//! Backfills missing `id`s on node shards before import.

use crate::error::{Error, Result};
use crate::validator::ValidationError;
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Collision-resistant id shaped like the platform's own: a leading `c`
/// followed by lowercase alphanumerics.
pub fn generate_id() -> String {
    format!("c{}", Uuid::new_v4().simple())
}

fn needs_id(record: &serde_json::Map<String, Value>) -> bool {
    match record.get("id") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

pub struct IdGenerator {
    out_dir: PathBuf,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    /// Writes into a fresh directory below the system temp dir.
    pub fn new() -> Self {
        Self::with_output_dir(env::temp_dir().join(generate_id()))
    }

    pub fn with_output_dir<P: Into<PathBuf>>(out_dir: P) -> Self {
        IdGenerator {
            out_dir: out_dir.into(),
        }
    }

    /// Copies each file into the output directory, giving every record
    /// without an id a new one. Source files are left untouched.
    pub fn generate_missing_ids<P: AsRef<Path>>(&self, files: &[P]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.out_dir)?;
        let mut generated = Vec::with_capacity(files.len());
        for file in files {
            let file = file.as_ref();
            let content = fs::read_to_string(file)?;
            let mut json: Value =
                serde_json::from_str(&content).map_err(|e| Error::shard_parse(file, e))?;

            let values = json
                .get_mut("values")
                .ok_or(ValidationError::MissingValues)?
                .as_array_mut()
                .ok_or(ValidationError::ValuesNotArray)?;
            let mut assigned = 0;
            for record in values.iter_mut().filter_map(Value::as_object_mut) {
                if needs_id(record) {
                    record.insert("id".to_string(), Value::String(generate_id()));
                    assigned += 1;
                }
            }

            let name = file.file_name().ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} is not a file", file.display()),
                ))
            })?;
            let target = self.out_dir.join(name);
            fs::write(&target, serde_json::to_string(&json)?)?;
            log::debug!(
                "assigned {} ids in {} -> {}",
                assigned,
                file.display(),
                target.display()
            );
            generated.push(target);
        }
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use serde_json::json;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let pattern = Regex::new(r"^c[a-zA-Z0-9_.-]*$").unwrap();
        let ids: HashSet<String> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| pattern.is_match(id)));
    }

    #[test]
    fn fills_only_missing_ids() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let source = src.path().join("000001.json");
        let original = r#"{"valueType":"nodes","values":[{"_typeName":"Post","title":"t"},{"_typeName":"Post","id":"abc123","title":"u"}]}"#;
        fs::write(&source, original).unwrap();

        let generator = IdGenerator::with_output_dir(out.path());
        let generated = generator.generate_missing_ids(&[&source]).unwrap();

        assert_eq!(generated, vec![out.path().join("000001.json")]);
        assert_eq!(fs::read_to_string(&source).unwrap(), original);

        let patched: Value = serde_json::from_str(&fs::read_to_string(&generated[0]).unwrap()).unwrap();
        let new_id = patched["values"][0]["id"].as_str().unwrap();
        assert!(Regex::new(r"^c[a-zA-Z0-9_.-]*").unwrap().is_match(new_id));
        assert_eq!(
            patched["values"][1],
            json!({ "_typeName": "Post", "id": "abc123", "title": "u" })
        );
    }

    #[test]
    fn requires_values() {
        let src = tempdir().unwrap();
        let source = src.path().join("broken.json");
        fs::write(&source, r#"{"valueType":"nodes"}"#).unwrap();

        let generator = IdGenerator::with_output_dir(src.path().join("out"));
        let err = generator.generate_missing_ids(&[source]).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingValues)));
    }
}
