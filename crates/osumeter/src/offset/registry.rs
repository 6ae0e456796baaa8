use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::offset::RemoteOffsets;

/// Key of the schema version entry at the top level of an offset file.
pub const SCHEMA_VERSION_KEY: &str = "SchemaVersion";

/// Where the active offset table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OffsetSource {
    File(PathBuf),
    Remote(String),
    /// No table: every lookup returns the caller's default.
    Builtin,
}

impl fmt::Display for OffsetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Remote(url) => write!(f, "remote {}", url),
            Self::Builtin => f.write_str("built-in defaults"),
        }
    }
}

/// Versioned `(type, field) -> offset` table with a parallel string table.
///
/// Lookups never fail; a missing entry yields the caller-supplied default.
#[derive(Debug, Clone)]
pub struct OffsetRegistry {
    offsets: HashMap<String, HashMap<String, i64>>,
    strings: HashMap<String, HashMap<String, String>>,
    schema_version: Option<String>,
    source: OffsetSource,
}

impl Default for OffsetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl OffsetRegistry {
    /// An empty registry: readers run on their compiled-in defaults.
    pub fn builtin() -> Self {
        Self {
            offsets: HashMap::new(),
            strings: HashMap::new(),
            schema_version: None,
            source: OffsetSource::Builtin,
        }
    }

    /// Parse an offset document.
    ///
    /// Field values may be JSON integers, hex strings (`"0x1C"`, `"-0x8"`) or
    /// plain strings, which go to the string table.
    pub fn from_json(content: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(content)?;
        let Value::Object(root) = root else {
            return Err(Error::InvalidOffsetFile(
                "top level is not an object".to_string(),
            ));
        };

        let mut registry = Self::builtin();
        for (type_name, value) in root {
            if type_name == SCHEMA_VERSION_KEY {
                registry.schema_version = match value {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                };
                continue;
            }

            let Value::Object(fields) = value else {
                debug!("Ignoring non-table offset entry '{}'", type_name);
                continue;
            };

            for (field, value) in fields {
                match value {
                    Value::Number(n) => {
                        if let Some(v) = n.as_i64() {
                            registry.insert(&type_name, &field, v);
                        }
                    }
                    Value::String(s) => match parse_hex(&s) {
                        Some(v) => registry.insert(&type_name, &field, v),
                        None => registry.insert_string(&type_name, &field, s),
                    },
                    _ => {}
                }
            }
        }
        Ok(registry)
    }

    /// Read and parse an offset file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let mut registry = Self::from_json(&content)?;
        registry.source = OffsetSource::File(path.as_ref().to_path_buf());
        Ok(registry)
    }

    /// Load from the first populated candidate, else from `remote`, else built-in.
    ///
    /// A fetched document is persisted to the first candidate path. Never fails.
    pub fn load(candidates: &[PathBuf], remote: Option<&dyn RemoteOffsets>) -> Self {
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(registry) if registry.is_placeholder() => {
                    info!("Offset file {} is a placeholder, skipping", path.display());
                }
                Ok(registry) => {
                    info!(
                        "Loaded offsets from {} (schema {})",
                        path.display(),
                        registry.schema_version().unwrap_or("?")
                    );
                    return registry;
                }
                Err(e) => warn!("Failed to load offsets from {}: {}", path.display(), e),
            }
        }

        if let Some(remote) = remote {
            match Self::fetch(remote, candidates.first().map(PathBuf::as_path)) {
                Ok(registry) => return registry,
                Err(e) => warn!("Failed to fetch offsets from {}: {}", remote.describe(), e),
            }
        }

        info!("Using built-in offsets");
        Self::builtin()
    }

    fn fetch(remote: &dyn RemoteOffsets, persist_to: Option<&Path>) -> Result<Self> {
        let content = remote.fetch()?;
        let mut registry = Self::from_json(&content)?;
        if registry.is_placeholder() {
            return Err(Error::OffsetFetchFailed(
                "remote document is a placeholder".to_string(),
            ));
        }
        registry.source = OffsetSource::Remote(remote.describe());
        info!(
            "Fetched offsets from {} (schema {})",
            remote.describe(),
            registry.schema_version().unwrap_or("?")
        );

        if let Some(path) = persist_to {
            if let Err(e) = persist(path, &content) {
                warn!("Failed to save offsets to {}: {}", path.display(), e);
            } else {
                debug!("Saved fetched offsets to {}", path.display());
            }
        }
        Ok(registry)
    }

    /// A file that exists but was never filled in.
    pub fn is_placeholder(&self) -> bool {
        let version_missing = match self.schema_version.as_deref().map(str::trim) {
            None | Some("") | Some("0") => true,
            Some(v) => v.eq_ignore_ascii_case("placeholder"),
        };
        version_missing || (self.offsets.is_empty() && self.strings.is_empty())
    }

    /// Integer offset, tolerating the compiler-generated backing-field name.
    pub fn get(&self, type_name: &str, field: &str, default: i64) -> i64 {
        self.lookup(&self.offsets, type_name, field)
            .copied()
            .unwrap_or(default)
    }

    pub fn get_string(&self, type_name: &str, field: &str, default: &str) -> String {
        self.lookup(&self.strings, type_name, field)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn contains(&self, type_name: &str, field: &str) -> bool {
        self.lookup(&self.offsets, type_name, field).is_some()
            || self.lookup(&self.strings, type_name, field).is_some()
    }

    fn lookup<'a, T>(
        &self,
        table: &'a HashMap<String, HashMap<String, T>>,
        type_name: &str,
        field: &str,
    ) -> Option<&'a T> {
        let fields = table.get(type_name)?;
        fields
            .get(field)
            .or_else(|| fields.get(&backing_field_name(field)))
            .or_else(|| plain_field_name(field).and_then(|plain| fields.get(plain)))
    }

    pub fn insert(&mut self, type_name: &str, field: &str, value: i64) {
        self.offsets
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    pub fn insert_string(&mut self, type_name: &str, field: &str, value: String) {
        self.strings
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    pub fn source(&self) -> &OffsetSource {
        &self.source
    }

    /// Number of integer and string entries.
    pub fn len(&self) -> usize {
        self.offsets.values().map(HashMap::len).sum::<usize>()
            + self.strings.values().map(HashMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Field` -> `<Field>k__BackingField`
fn backing_field_name(field: &str) -> String {
    format!("<{}>k__BackingField", field)
}

/// `<Field>k__BackingField` -> `Field`
fn plain_field_name(field: &str) -> Option<&str> {
    field.strip_prefix('<')?.strip_suffix(">k__BackingField")
}

fn parse_hex(value: &str) -> Option<i64> {
    let value = value.trim();
    let (negative, rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let digits = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X"))?;
    let parsed = i64::from_str_radix(digits, 16).ok()?;
    Some(if negative { -parsed } else { parsed })
}

fn persist(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "SchemaVersion": "2024.1",
        "OsuGame": { "<ScreenStack>k__BackingField": "0x4A8", "Beatmap": 1200 },
        "Player": { "ScoreProcessor": "-0x10" },
        "Signatures": { "Base": "F8 01 74 04 83 65" }
    }"#;

    struct FakeRemote {
        body: String,
        calls: Cell<u32>,
    }

    impl RemoteOffsets for FakeRemote {
        fn fetch(&self) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.body.clone())
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    #[test]
    fn test_parse_numbers_hex_and_strings() {
        let registry = OffsetRegistry::from_json(SAMPLE).unwrap();

        assert_eq!(registry.schema_version(), Some("2024.1"));
        assert_eq!(registry.get("OsuGame", "Beatmap", 0), 1200);
        assert_eq!(registry.get("Player", "ScoreProcessor", 0), -0x10);
        assert_eq!(
            registry.get_string("Signatures", "Base", ""),
            "F8 01 74 04 83 65"
        );
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_backing_field_alias() {
        let registry = OffsetRegistry::from_json(SAMPLE).unwrap();

        // Stored as backing field, looked up by plain name
        assert_eq!(registry.get("OsuGame", "ScreenStack", 0), 0x4A8);
        // Stored plain, looked up by backing field name
        assert_eq!(registry.get("OsuGame", "<Beatmap>k__BackingField", 0), 1200);
    }

    #[test]
    fn test_missing_entries_return_default() {
        let registry = OffsetRegistry::from_json(SAMPLE).unwrap();

        assert_eq!(registry.get("OsuGame", "Nope", 0x42), 0x42);
        assert_eq!(registry.get("Nope", "Beatmap", 7), 7);
        assert_eq!(registry.get_string("Signatures", "Nope", "AA BB"), "AA BB");
        assert_eq!(OffsetRegistry::builtin().get("OsuGame", "Beatmap", 3), 3);
    }

    #[test]
    fn test_placeholder_detection() {
        for doc in [
            r#"{"OsuGame": {"Beatmap": 1}}"#,
            r#"{"SchemaVersion": "", "OsuGame": {"Beatmap": 1}}"#,
            r#"{"SchemaVersion": "0", "OsuGame": {"Beatmap": 1}}"#,
            r#"{"SchemaVersion": "PLACEHOLDER", "OsuGame": {"Beatmap": 1}}"#,
            r#"{"SchemaVersion": "2024.1"}"#,
        ] {
            assert!(OffsetRegistry::from_json(doc).unwrap().is_placeholder(), "{}", doc);
        }
        assert!(!OffsetRegistry::from_json(SAMPLE).unwrap().is_placeholder());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(OffsetRegistry::from_json("[1, 2]").is_err());
        assert!(OffsetRegistry::from_json("{not json").is_err());
    }

    #[test]
    fn test_load_first_populated_candidate() {
        let dir = TempDir::new().unwrap();
        let placeholder = dir.path().join("a.json");
        let real = dir.path().join("b.json");
        fs::write(&placeholder, r#"{"SchemaVersion": "placeholder"}"#).unwrap();
        fs::write(&real, SAMPLE).unwrap();

        let registry = OffsetRegistry::load(
            &[dir.path().join("missing.json"), placeholder, real.clone()],
            None,
        );

        assert_eq!(registry.source(), &OffsetSource::File(real));
        assert_eq!(registry.get("OsuGame", "Beatmap", 0), 1200);
    }

    #[test]
    fn test_load_falls_back_to_remote_and_persists() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("offsets.json");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, r#"{"SchemaVersion": "0"}"#).unwrap();
        let remote = FakeRemote {
            body: SAMPLE.to_string(),
            calls: Cell::new(0),
        };

        let registry = OffsetRegistry::load(std::slice::from_ref(&target), Some(&remote));

        assert_eq!(remote.calls.get(), 1);
        assert_eq!(registry.source(), &OffsetSource::Remote("fake".to_string()));
        let reloaded = OffsetRegistry::from_file(&target).unwrap();
        assert!(!reloaded.is_placeholder());
    }

    #[test]
    fn test_load_without_anything_is_builtin() {
        let dir = TempDir::new().unwrap();
        let remote = FakeRemote {
            body: "garbage".to_string(),
            calls: Cell::new(0),
        };

        let registry = OffsetRegistry::load(&[dir.path().join("none.json")], Some(&remote));

        assert_eq!(registry.source(), &OffsetSource::Builtin);
        assert!(registry.is_empty());
        assert!(!dir.path().join("none.json").exists());
    }
}
