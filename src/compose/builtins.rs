//! Builtin infrastructure catalogue
//!
//! A builtin is only part of the topology when its key appears in
//! `maverick.yml`. An empty entry takes the catalogue default, a mapping is
//! merged on top of it.

use super::config::{Category, CommandConfig, ConfigDefaults, ServiceDeclaration, StringList};
use super::merge::merge_declarations;
use crate::error::Result;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Catalogue default for a builtin, `None` for unknown names
pub fn default_declaration(name: &str) -> Option<ServiceDeclaration> {
    let decl = match name {
        "minio" => ServiceDeclaration {
            image: Some("minio/minio".to_string()),
            volumes: Some(StringList::of(&["minio-data:/data"])),
            env_file: Some(StringList::of(&[".env"])),
            command: Some(CommandConfig::Exec(strings(&[
                "--compat",
                "server",
                "--address",
                "0.0.0.0:9000",
                "/data",
            ]))),
            ..Default::default()
        },
        "mysql" => ServiceDeclaration {
            image: Some("mysql:5.7".to_string()),
            ports: Some(StringList::of(&["3306:3306"])),
            volumes: Some(StringList::of(&["mysql-data:/var/lib/mysql"])),
            ..Default::default()
        },
        "ngrok" => ServiceDeclaration {
            image: Some("wernight/ngrok".to_string()),
            ports: Some(StringList::of(&["4040:4040"])),
            environment: Some(StringList::of(&[])),
            ..Default::default()
        },
        "postgresql" => ServiceDeclaration {
            image: Some("postgres:12".to_string()),
            ports: Some(StringList::of(&["5432:5432"])),
            volumes: Some(StringList::of(&["postgresql-data:/var/lib/postgresql/data"])),
            ..Default::default()
        },
        "redis" => ServiceDeclaration {
            image: Some("redis:3".to_string()),
            volumes: Some(StringList::of(&["redis-data:/data"])),
            ports: Some(StringList::of(&["6379:6379"])),
            command: Some(CommandConfig::Shell("redis-server --appendonly yes".to_string())),
            ..Default::default()
        },
        _ => return None,
    };
    Some(decl)
}

/// Resolve one builtin against its `maverick.yml` entry.
///
/// `entry` is `None` when the key is absent, `Some(None)` when the key is
/// present without a value.
pub fn builtin_declaration(
    name: &str,
    entry: Option<Option<&ServiceDeclaration>>,
    defaults: &ConfigDefaults,
) -> Result<Option<ServiceDeclaration>> {
    let Some(entry) = entry else {
        return Ok(None);
    };
    let Some(base) = default_declaration(name) else {
        return Ok(None);
    };

    let merged = merge_declarations(&[
        Some(&base),
        Some(&defaults.all),
        defaults.for_category(Category::Infrastructure),
        entry,
    ])?;
    Ok(Some(merged))
}
