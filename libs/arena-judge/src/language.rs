// Language resolution: human-readable names -> backend language ids
// Built-in table, optionally replaced from languages.json

use crate::error::JudgeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    /// Canonical name, stored on submissions
    pub name: String,
    /// Backend (Judge0) language id
    pub language_id: u32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LanguagesFile {
    languages: Vec<LanguageEntry>,
}

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse languages file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("alias '{alias}' maps to both {first} and {second}")]
    ConflictingAlias {
        alias: String,
        first: u32,
        second: u32,
    },

    #[error("no languages configured")]
    Empty,
}

/// A resolved language: what the backend wants and what we record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLanguage<'a> {
    pub name: &'a str,
    pub language_id: u32,
}

/// Alias table. Lookups are case-insensitive and ignore surrounding whitespace.
#[derive(Debug, Clone)]
pub struct LanguageResolver {
    entries: Vec<LanguageEntry>,
    by_alias: HashMap<String, usize>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn builtin_entries() -> Vec<LanguageEntry> {
    let entry = |name: &str, language_id: u32, aliases: &[&str]| LanguageEntry {
        name: name.to_string(),
        language_id,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    };

    vec![
        entry("cpp", 54, &["c++", "cpp", "cplusplus"]),
        entry("java", 62, &["java"]),
        entry("javascript", 63, &["javascript", "js", "node", "nodejs"]),
    ]
}

impl Default for LanguageResolver {
    fn default() -> Self {
        let entries = builtin_entries();
        let by_alias = entries
            .iter()
            .enumerate()
            .flat_map(|(idx, entry)| {
                std::iter::once(&entry.name)
                    .chain(entry.aliases.iter())
                    .map(move |alias| (normalize(alias), idx))
            })
            .collect();

        Self { entries, by_alias }
    }
}

impl LanguageResolver {
    pub fn from_entries(entries: Vec<LanguageEntry>) -> Result<Self, LanguageError> {
        if entries.is_empty() {
            return Err(LanguageError::Empty);
        }

        let mut by_alias: HashMap<String, usize> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let names = std::iter::once(&entry.name).chain(entry.aliases.iter());
            for alias in names.map(|a| normalize(a)) {
                if let Some(&existing) = by_alias.get(&alias) {
                    let first = entries[existing].language_id;
                    if first != entry.language_id {
                        return Err(LanguageError::ConflictingAlias {
                            alias,
                            first,
                            second: entry.language_id,
                        });
                    }
                    continue;
                }
                by_alias.insert(alias, idx);
            }
        }

        Ok(Self { entries, by_alias })
    }

    /// Load the alias table from a languages.json file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, LanguageError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| LanguageError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: LanguagesFile = serde_json::from_str(&content)?;
        Self::from_entries(file.languages)
    }

    /// Load from `path` when it exists, otherwise fall back to the built-in table
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, LanguageError> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn resolve(&self, name: &str) -> Result<ResolvedLanguage<'_>, JudgeError> {
        self.by_alias
            .get(&normalize(name))
            .map(|&idx| {
                let entry = &self.entries[idx];
                ResolvedLanguage {
                    name: &entry.name,
                    language_id: entry.language_id,
                }
            })
            .ok_or_else(|| JudgeError::UnsupportedLanguage(name.to_string()))
    }

    pub fn languages(&self) -> &[LanguageEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cpp_aliases_share_an_id() {
        let resolver = LanguageResolver::default();
        for name in ["C++", "cpp", "c++", "CPP", " Cpp "] {
            let lang = resolver.resolve(name).unwrap();
            assert_eq!(lang.language_id, 54, "{}", name);
            assert_eq!(lang.name, "cpp");
        }
    }

    #[test]
    fn test_javascript_and_java_aliases() {
        let resolver = LanguageResolver::default();
        for name in ["javascript", "JavaScript", "js", "JS"] {
            assert_eq!(resolver.resolve(name).unwrap().language_id, 63);
        }
        for name in ["java", "Java", "JAVA"] {
            assert_eq!(resolver.resolve(name).unwrap().language_id, 62);
        }
    }

    #[test]
    fn test_unknown_language_fails() {
        let resolver = LanguageResolver::default();
        for name in ["cobol", "", "java script", "c"] {
            let err = resolver.resolve(name).unwrap_err();
            assert!(matches!(err, JudgeError::UnsupportedLanguage(ref n) if n == name));
        }
    }

    #[test]
    fn test_conflicting_alias_rejected() {
        let entries = vec![
            LanguageEntry {
                name: "python".to_string(),
                language_id: 71,
                aliases: vec!["py".to_string()],
            },
            LanguageEntry {
                name: "python2".to_string(),
                language_id: 70,
                aliases: vec!["PY".to_string()],
            },
        ];
        let err = LanguageResolver::from_entries(entries).unwrap_err();
        assert!(matches!(err, LanguageError::ConflictingAlias { first: 71, second: 70, .. }));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(matches!(
            LanguageResolver::from_entries(Vec::new()),
            Err(LanguageError::Empty)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"languages":[{{"name":"python","language_id":71,"aliases":["py","python3"]}}]}}"#
        )
        .unwrap();

        let resolver = LanguageResolver::load_from_file(file.path()).unwrap();
        assert_eq!(resolver.resolve("Python3").unwrap().language_id, 71);
        assert!(resolver.resolve("cpp").is_err());
        assert_eq!(resolver.languages().len(), 1);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let resolver = LanguageResolver::load_or_default("does/not/exist.json").unwrap();
        assert_eq!(resolver.resolve("c++").unwrap().language_id, 54);
    }
}
