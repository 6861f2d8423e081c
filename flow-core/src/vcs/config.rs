use git2::{Config, ConfigLevel, Error, ErrorCode, Repository};
use std::path::{Path, PathBuf};

/// Which configuration file a read or write targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigScope {
    /// Every level git consults, highest priority wins. Writes go to the repository file.
    #[default]
    Merged,
    Local,
    Global,
    System,
    File(PathBuf),
}

fn open_scope(repo: &Repository, scope: &ConfigScope) -> Result<Config, Error> {
    match scope {
        ConfigScope::Merged => repo.config(),
        ConfigScope::Local => repo.config()?.open_level(ConfigLevel::Local),
        ConfigScope::Global => Config::open_default()?.open_level(ConfigLevel::Global),
        ConfigScope::System => Config::open_default()?.open_level(ConfigLevel::System),
        ConfigScope::File(path) => Config::open(path),
    }
}

fn open_writable(repo: &Repository, scope: &ConfigScope) -> Result<Config, Error> {
    match scope {
        ConfigScope::Merged => open_scope(repo, &ConfigScope::Local),
        other => open_scope(repo, other),
    }
}

pub fn get_config_in<P: AsRef<Path>>(
    repo_path: P,
    scope: &ConfigScope,
    key: &str,
) -> Result<Option<String>, Error> {
    let repo = Repository::open(repo_path)?;
    let config = open_scope(&repo, scope)?;
    match config.get_string(key) {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

pub fn set_config_in<P: AsRef<Path>>(
    repo_path: P,
    scope: &ConfigScope,
    key: &str,
    value: &str,
) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let mut config = open_writable(&repo, scope)?;
    config.set_str(key, value)
}

/// Remove `key`; a key that is not set is not an error.
pub fn unset_config_in<P: AsRef<Path>>(
    repo_path: P,
    scope: &ConfigScope,
    key: &str,
) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let mut config = open_writable(&repo, scope)?;
    match config.remove(key) {
        Ok(()) => Ok(()),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Remove every key under `section.` (for example `gitflow.branch.develop`).
pub fn remove_section_in<P: AsRef<Path>>(
    repo_path: P,
    scope: &ConfigScope,
    section: &str,
) -> Result<(), Error> {
    let keys: Vec<String> = config_entries_in(repo_path.as_ref(), scope, section)?
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    for key in keys {
        unset_config_in(repo_path.as_ref(), scope, &key)?;
    }
    Ok(())
}

/// `(key, value)` pairs under `prefix.`, in the order git reads them. Keys come back lowercased
/// in their section and variable parts, as git normalizes them.
pub fn config_entries_in<P: AsRef<Path>>(
    repo_path: P,
    scope: &ConfigScope,
    prefix: &str,
) -> Result<Vec<(String, String)>, Error> {
    let repo = Repository::open(repo_path)?;
    let config = open_scope(&repo, scope)?;
    let glob = format!("^{}\\.", regex_escape(prefix));
    let mut entries = config.entries(Some(&glob))?;

    let mut out = Vec::new();
    while let Some(entry) = entries.next() {
        let entry = entry?;
        if let (Some(name), Some(value)) = (entry.name(), entry.value()) {
            out.push((name.to_string(), value.to_string()));
        }
    }
    Ok(out)
}

fn regex_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if "\\.+*?()|[]{}^$".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Parse a git boolean (`true/yes/on/1` and `false/no/off/0`).
pub fn parse_config_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}
