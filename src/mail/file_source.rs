//! ディレクトリ上の JSON メッセージリソースを読むメールソース
//!
//! メールソースからエクスポートした `format=full` 形式の JSON ファイル（1 ファイル 1 メッセージ）を
//! 読み込み、`from:` / `subject:` だけをサポートする簡易クエリで検索する。
//! ファイル名順に並べるため、同じディレクトリからは常に同じ順序で ID が返る。

use super::message::RawMessage;
use super::source::MailSource;
use async_trait::async_trait;
use std::fs;
use std::path::Path;

/// ファイルベースのメールソース
pub struct FileMailSource {
    messages: Vec<RawMessage>,
}

impl FileMailSource {
    /// ディレクトリ内の *.json をすべて読み込む
    pub fn load(dir: &Path) -> Result<Self, String> {
        let entries = fs::read_dir(dir)
            .map_err(|e| format!("Failed to read message directory {}: {e}", dir.display()))?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        paths.sort();

        let mut messages = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read message file {}: {e}", path.display()))?;
            match serde_json::from_str::<RawMessage>(&contents) {
                Ok(message) if !message.id.is_empty() => messages.push(message),
                Ok(_) => log::warn!("Skipping message file without id: {}", path.display()),
                Err(e) => log::warn!("Skipping invalid message file {}: {e}", path.display()),
            }
        }

        log::info!("Loaded {} message(s) from {}", messages.len(), dir.display());
        Ok(Self { messages })
    }

    /// 読み込み済みメッセージから作成
    pub fn from_messages(messages: Vec<RawMessage>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl MailSource for FileMailSource {
    async fn list_message_ids(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>, String> {
        let terms = parse_query(query);
        Ok(self
            .messages
            .iter()
            .filter(|message| matches_query(message, &terms))
            .take(max_results as usize)
            .map(|message| message.id.clone())
            .collect())
    }

    async fn get_message(&self, message_id: &str) -> Result<RawMessage, String> {
        self.messages
            .iter()
            .find(|message| message.id == message_id)
            .cloned()
            .ok_or_else(|| format!("Message not found: {message_id}"))
    }
}

/// クエリの 1 条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTerm {
    From(String),
    Subject(String),
    /// 修飾子なしの語（From または Subject に含まれればよい）
    Any(String),
}

/// 空白区切りのクエリを条件に分解する（すべて AND）
pub fn parse_query(query: &str) -> Vec<QueryTerm> {
    query
        .split_whitespace()
        .map(|token| {
            let lower = token.to_lowercase();
            if let Some(value) = lower.strip_prefix("from:") {
                QueryTerm::From(value.to_string())
            } else if let Some(value) = lower.strip_prefix("subject:") {
                QueryTerm::Subject(value.to_string())
            } else {
                QueryTerm::Any(lower)
            }
        })
        .collect()
}

fn matches_query(message: &RawMessage, terms: &[QueryTerm]) -> bool {
    let from = message
        .payload
        .header("From")
        .map(str::to_lowercase)
        .unwrap_or_default();
    let subject = message
        .payload
        .header("Subject")
        .map(str::to_lowercase)
        .unwrap_or_default();

    terms.iter().all(|term| match term {
        QueryTerm::From(value) => from.contains(value.as_str()),
        QueryTerm::Subject(value) => subject.contains(value.as_str()),
        QueryTerm::Any(value) => from.contains(value.as_str()) || subject.contains(value.as_str()),
    })
}
