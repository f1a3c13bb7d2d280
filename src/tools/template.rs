//! Starter YAML snippets

use crate::compose::builtins::default_declaration;
use crate::compose::config::Category;
use crate::error::{MaverickError, Result};
use std::collections::BTreeMap;

/// Starter `maverick.yml`; `{name}` is replaced with the project name
const STARTER: &str = r#"# Maverick project configuration
name: {name}

# Directory packages live under inside their containers
workspaceDir: /opt

# Existing networks every unit joins
networks: []

# Layers merged into every unit, and into every unit of one category
defaults:
  all: {}

# Builtin infrastructure is enabled by listing its key, e.g.
# mysql:
# redis:
#   ports:
#     - "6380:6379"

images: {}
infrastructure: {}
batch: {}
packages: {}
services: {}

# Per-unit overrides, applied last
overrides: {}
"#;

const IMAGE: &str = r#"images:
  base:
    build:
      context: .
      dockerfile: docker/base.Dockerfile
"#;

const INFRASTRUCTURE: &str = r#"infrastructure:
  mailhog:
    image: mailhog/mailhog
    ports:
      - "8025:8025"
"#;

const BATCH: &str = r#"batch:
  migrate:
    image: "{{ image(api) }}"
    command: npm run migrate
    depends_on:
      - mysql
"#;

const PACKAGES: &str = r#"packages:
  "@scope/models":
    environment:
      - NODE_ENV=development
"#;

const SERVICES: &str = r#"services:
  "@scope/api":
    ports:
      - "3000:3000"
"#;

const OVERRIDES: &str = r#"overrides:
  scope_api:
    image: "{{ safePackageName }}:{{ dependencyHash }}"
    build:
      context: .
      args:
        PACKAGE: "{{ packageName }}"
"#;

const DEFAULTS: &str = r#"defaults:
  all:
    networks:
      - shared
  services:
    image: node:14
    tty: true
"#;

/// Starter `maverick.yml` for a project
pub fn starter_config(name: &str) -> String {
    STARTER.replace("{name}", name)
}

/// Snippet for a category, a builtin, `overrides`, `defaults` or `config`
pub fn snippet(kind: &str) -> Result<String> {
    if let Ok(category) = kind.parse::<Category>() {
        let text = match category {
            Category::Images => IMAGE,
            Category::Infrastructure => INFRASTRUCTURE,
            Category::Batch => BATCH,
            Category::Packages => PACKAGES,
            Category::Services => SERVICES,
        };
        return Ok(text.to_string());
    }

    match kind {
        "overrides" => Ok(OVERRIDES.to_string()),
        "defaults" => Ok(DEFAULTS.to_string()),
        "config" => Ok(starter_config("my-project")),
        name => {
            let declaration = default_declaration(name).ok_or_else(|| {
                MaverickError::InvalidArguments(format!("no template for {}", name))
            })?;
            let mut entry = BTreeMap::new();
            entry.insert(name, declaration);
            Ok(serde_yaml::to_string(&entry)?)
        }
    }
}
