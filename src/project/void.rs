//! Parser for projects without supported monorepo tooling

use super::{ProjectInfo, ProjectParser};
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Reports no packages; only declared units end up in the topology
pub struct VoidParser {
    root: PathBuf,
}

impl VoidParser {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ProjectParser for VoidParser {
    async fn parse(&self) -> Result<ProjectInfo> {
        Ok(ProjectInfo::empty(self.root.clone()))
    }
}
