//! Plugin Discovery - 플러그인 디렉토리에서 매니페스트 발견
//!
//! 한 플러그인의 매니페스트가 깨져도 나머지 발견은 계속됩니다.

use super::manifest::PluginManifest;
use harbor_foundation::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// 기본 매니페스트 파일명
pub const MANIFEST_FILE: &str = "plugin.json";

// ============================================================================
// DiscoveredPlugin - 발견된 플러그인
// ============================================================================

/// 발견된 플러그인 정보
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    /// 플러그인 매니페스트
    pub manifest: PluginManifest,

    /// 플러그인 디렉토리 경로
    pub path: PathBuf,
}

/// 건너뛴 플러그인 디렉토리
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedPlugin {
    pub path: PathBuf,

    /// 에러 종류 (`manifest_parse`, `manifest_validation`, `duplicate_id`)
    pub kind: String,
    pub message: String,
}

/// 한 번의 발견 결과
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub plugins: Vec<DiscoveredPlugin>,
    pub skipped: Vec<SkippedPlugin>,
}

// ============================================================================
// PluginDiscovery
// ============================================================================

/// 플러그인 발견 시스템
#[derive(Debug, Clone)]
pub struct PluginDiscovery {
    /// 검색 경로들 (우선순위 순)
    search_paths: Vec<PathBuf>,

    /// 매니페스트 파일명
    manifest_file_name: String,
}

impl PluginDiscovery {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            manifest_file_name: MANIFEST_FILE.to_string(),
        }
    }

    pub fn with_manifest_file_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_file_name = name.into();
        self
    }

    /// 검색 경로 추가
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn manifest_file_name(&self) -> &str {
        &self.manifest_file_name
    }

    /// 모든 플러그인 발견
    ///
    /// 검색 경로 순서, 그 안에서는 디렉토리 이름 순. 같은 ID가 다시 나오면
    /// 먼저 발견된 것이 유지됩니다.
    pub async fn discover(&self) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        let mut seen = HashSet::new();

        for dir in &self.search_paths {
            if !fs::try_exists(dir).await.unwrap_or(false) {
                debug!("Plugin directory {} does not exist, skipping", dir.display());
                continue;
            }

            let candidates = match self.list_plugin_dirs(dir).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("Failed to scan plugin directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            for path in candidates {
                let manifest_path = path.join(&self.manifest_file_name);
                if !fs::try_exists(&manifest_path).await.unwrap_or(false) {
                    debug!("No {} in {}, skipping", self.manifest_file_name, path.display());
                    continue;
                }

                match PluginManifest::load(&manifest_path).await {
                    Ok(manifest) => {
                        if !seen.insert(manifest.id.clone()) {
                            warn!(
                                plugin_id = %manifest.id,
                                "Duplicate plugin id at {}, keeping the first one",
                                path.display()
                            );
                            report.skipped.push(SkippedPlugin {
                                path,
                                kind: "duplicate_id".to_string(),
                                message: format!("plugin id '{}' already discovered", manifest.id),
                            });
                            continue;
                        }

                        debug!(plugin_id = %manifest.id, "Found plugin at {}", path.display());
                        report.plugins.push(DiscoveredPlugin { manifest, path });
                    }
                    Err(e) => {
                        warn!("Skipping plugin at {}: {}", path.display(), e);
                        report.skipped.push(SkippedPlugin {
                            path,
                            kind: e.kind().to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            "Discovered {} plugins ({} skipped)",
            report.plugins.len(),
            report.skipped.len()
        );
        report
    }

    /// 단일 플러그인 디렉토리의 매니페스트 다시 읽기
    pub async fn read_manifest(&self, plugin_dir: &Path) -> Result<PluginManifest> {
        PluginManifest::load(&plugin_dir.join(&self.manifest_file_name)).await
    }

    /// 하위 디렉토리 목록 (이름 순, 심볼릭 링크는 따라감)
    async fn list_plugin_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = fs::read_dir(dir).await.map_err(Error::Io)?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match fs::metadata(&path).await {
                Ok(metadata) if metadata.is_dir() => dirs.push(path),
                Ok(_) => {}
                Err(e) => debug!("Skipping unreadable entry {}: {}", path.display(), e),
            }
        }

        dirs.sort();
        Ok(dirs)
    }
}
