//! メールソースから受け取る MIME メッセージのデータモデル
//!
//! メールソースの JSON メッセージリソース（`format=full`）をそのままデシリアライズできる形にしている。
//! パーツツリーは抽出処理で一度だけ消費され、保持されない。

use serde::{Deserialize, Serialize};

/// 1 通のメッセージ（識別子 + パーツツリー）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// メッセージID（保存時の重複排除キー）
    pub id: String,
    /// スレッドID
    #[serde(default)]
    pub thread_id: Option<String>,
    /// ルートパーツ
    #[serde(default)]
    pub payload: Part,
}

/// MIME パーツツリーの 1 ノード
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// MIME タイプ（例: "text/plain", "text/html", "multipart/alternative"）
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    /// 子パーツ（文書順）
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// パーツ本文（base64 エンコード済み）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Part {
    /// 本文付きのリーフパーツを作成
    pub fn leaf(mime_type: &str, data: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            headers: Vec::new(),
            body: Some(PartBody {
                size: Some(data.len() as i64),
                data: Some(data.to_string()),
            }),
            parts: Vec::new(),
        }
    }

    /// 子パーツを持つコンテナパーツを作成
    pub fn container(mime_type: &str, parts: Vec<Part>) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            headers: Vec::new(),
            body: None,
            parts,
        }
    }

    /// ヘッダー値を取得する（ヘッダー名は大文字小文字を区別しない）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// 空でない本文データ
    pub fn body_data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|data| !data.is_empty())
    }

    /// multipart コンテナかどうか
    pub fn is_container(&self) -> bool {
        self.mime_type
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("multipart")
    }
}

impl RawMessage {
    /// Date ヘッダーの値
    pub fn date_header(&self) -> Option<&str> {
        self.payload.header("Date")
    }
}
