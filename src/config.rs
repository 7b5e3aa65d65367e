//! アプリケーション設定ファイルの管理
//!
//! 取得・パース・保存先の設定を foodspend_config.json で管理する。
//! 各セクションは `#[serde(default)]` なので、項目が欠けた古いファイルもそのまま読める。

use crate::mail::WalkLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "foodspend_config.json";

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub parse: ParseConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// メール取得・バッチ設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// メールソースに投げる検索クエリ（結果はまとめて重複除去）
    pub queries: Vec<String>,
    /// クエリ1件あたりの最大取得数
    pub max_results: u32,
    pub batch_size: usize,
    /// バッチ間のディレイ（ミリ秒）
    pub delay_ms: u64,
    /// 1バッチ内で同時に処理するメッセージ数
    pub concurrency: usize,
    /// 1通あたりのパース時間の上限（ミリ秒）
    pub parse_timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            queries: vec![
                "from:noreply@zomato.com".to_string(),
                "from:zomato.com subject:order".to_string(),
                "from:noreply@swiggy.in".to_string(),
                "from:swiggy.in subject:order".to_string(),
            ],
            max_results: 100,
            batch_size: 50,
            delay_ms: 0,
            concurrency: 4,
            parse_timeout_ms: 5000,
        }
    }
}

/// パース設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// これより短い本文は「本文なし」として失敗扱い
    pub min_body_chars: usize,
    /// MIME ツリーの最大深さ（None は無制限）
    pub max_part_depth: Option<usize>,
    /// 1 パーツあたりのデコード後の上限バイト数（None は無制限）
    pub max_body_bytes: Option<usize>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            min_body_chars: 50,
            max_part_depth: None,
            max_body_bytes: None,
        }
    }
}

impl ParseConfig {
    pub fn walk_limits(&self) -> WalkLimits {
        WalkLimits {
            max_depth: self.max_part_depth,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// 保存先設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// DB ファイル名（相対パスは設定ディレクトリ基準）
    pub database_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_file: "foodspend.db".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn database_path(&self, config_dir: &Path) -> PathBuf {
        let path = Path::new(&self.database_file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.join(path)
        }
    }
}

/// 設定を読み込む。ファイルが存在しない場合はデフォルトを返し、保存する。
pub fn load(config_dir: &Path) -> Result<AppConfig, String> {
    let path = config_dir.join(CONFIG_FILENAME);

    if path.exists() {
        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        serde_json::from_str(&contents).map_err(|e| format!("Invalid config JSON: {e}"))
    } else {
        let config = AppConfig::default();
        save(config_dir, &config)?;
        log::info!("Created default config at {}", path.display());
        Ok(config)
    }
}

/// 設定を保存する。
pub fn save(config_dir: &Path, config: &AppConfig) -> Result<(), String> {
    fs::create_dir_all(config_dir).map_err(|e| format!("Failed to create config dir: {e}"))?;

    let path = config_dir.join(CONFIG_FILENAME);
    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {e}"))?;

    fs::write(&path, contents).map_err(|e| format!("Failed to write config file: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_default_when_missing() {
        let dir = TempDir::new().unwrap();
        let config = load(dir.path()).unwrap();
        assert_eq!(config.fetch.queries.len(), 4);
        assert_eq!(config.fetch.max_results, 100);
        assert_eq!(config.fetch.batch_size, 50);
        assert_eq!(config.fetch.concurrency, 4);
        assert_eq!(config.fetch.parse_timeout_ms, 5000);
        assert_eq!(config.parse.min_body_chars, 50);
        assert_eq!(config.parse.max_part_depth, None);
        assert_eq!(config.store.database_file, "foodspend.db");

        assert!(dir.path().join(CONFIG_FILENAME).exists());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.fetch.queries = vec!["from:swiggy.in".to_string()];
        config.fetch.delay_ms = 250;
        config.parse.max_body_bytes = Some(1 << 20);
        config.store.database_file = "other.db".to_string();

        save(dir.path(), &config).unwrap();
        assert_eq!(load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            r#"{ "fetch": { "batch_size": 10 } }"#,
        )
        .unwrap();

        let config = load(dir.path()).unwrap();
        assert_eq!(config.fetch.batch_size, 10);
        assert_eq!(config.fetch.max_results, 100);
        assert_eq!(config.parse, ParseConfig::default());
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_load_invalid_json_returns_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "{ not json").unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(err.contains("Invalid config JSON"));
    }

    #[test]
    fn test_database_path_relative_and_absolute() {
        let dir = TempDir::new().unwrap();
        let store = StoreConfig::default();
        assert_eq!(store.database_path(dir.path()), dir.path().join("foodspend.db"));

        let absolute = dir.path().join("elsewhere.db");
        let store = StoreConfig {
            database_file: absolute.to_string_lossy().into_owned(),
        };
        assert_eq!(store.database_path(Path::new("/unused")), absolute);
    }

    #[test]
    fn test_walk_limits_from_parse_config() {
        let parse = ParseConfig {
            max_part_depth: Some(8),
            ..ParseConfig::default()
        };
        let limits = parse.walk_limits();
        assert_eq!(limits.max_depth, Some(8));
        assert_eq!(limits.max_body_bytes, None);
    }
}
