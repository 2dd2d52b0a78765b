//! `environments.yaml` の検索と読み込み
//!
//! ```yaml
//! default: sample
//! environments:
//!   sample:
//!     type: openstack
//!     auth-url: https://keystone.example.com:5000/v2.0
//!     default-image-id: 0f602ea9-c09e-440c-9e29-cfae5635afa3
//! ```
//!
//! 各環境の属性は YAML のまま保持し、型付きの解釈はプロバイダ側で行う。

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ENVIRONMENTS_FILE: &str = "environments.yaml";

/// 環境定義ファイルを直接指定する環境変数
pub const ENVIRONMENTS_ENV: &str = "CIRRUS_ENVIRONMENTS";

/// Cirrusの設定ディレクトリ (`~/.config/cirrus`) を取得（なければ作成）
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("cirrus");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// 環境ごとのプロバイダ状態の既定保存先
pub fn default_storage_dir(environment: &str) -> Result<PathBuf> {
    Ok(get_config_dir()?.join("environments").join(environment))
}

/// 環境定義ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 CIRRUS_ENVIRONMENTS (直接パス指定)
/// 2. カレントディレクトリ: environments.yaml
/// 3. ./.cirrus/ ディレクトリ内: environments.yaml
/// 4. ~/.config/cirrus/environments.yaml (グローバル設定)
pub fn find_environments_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(path) = std::env::var(ENVIRONMENTS_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{} points at a missing file", ENVIRONMENTS_ENV);
    }

    // 2. カレントディレクトリで検索
    let current_dir = std::env::current_dir()?;

    let path = current_dir.join(ENVIRONMENTS_FILE);
    if path.exists() {
        return Ok(path);
    }

    // 3. ./.cirrus/ ディレクトリで検索
    let path = current_dir.join(".cirrus").join(ENVIRONMENTS_FILE);
    if path.exists() {
        return Ok(path);
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("cirrus").join(ENVIRONMENTS_FILE);
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::EnvironmentsFileNotFound)
}

/// 読み込んだ環境定義ファイル
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environments {
    /// 環境名の指定がないときに使う環境
    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub environments: BTreeMap<String, serde_yaml::Value>,

    /// 読み込み元のファイル
    #[serde(skip)]
    pub path: PathBuf,
}

/// ファイルから選択した1つの環境
#[derive(Debug, Clone)]
pub struct SelectedEnvironment {
    pub name: String,
    pub attributes: serde_yaml::Value,
}

impl Environments {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut environments: Environments =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        environments.path = path.to_path_buf();

        tracing::debug!(
            path = %path.display(),
            count = environments.environments.len(),
            "loaded environments"
        );
        Ok(environments)
    }

    /// 環境定義ファイルを探して読み込む
    pub fn discover() -> Result<Self> {
        Self::load(&find_environments_file()?)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(String::as_str)
    }

    /// `name`、既定の環境、唯一の環境の順に選択する
    pub fn select(&self, name: Option<&str>) -> Result<SelectedEnvironment> {
        let name = match name.or(self.default.as_deref()) {
            Some(name) => name.to_string(),
            None if self.environments.len() == 1 => {
                self.environments.keys().next().cloned().unwrap_or_default()
            }
            None => return Err(ConfigError::NoDefaultEnvironment),
        };

        let attributes = self
            .environments
            .get(&name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: name.clone(),
                path: self.path.clone(),
            })?;

        Ok(SelectedEnvironment { name, attributes })
    }
}
