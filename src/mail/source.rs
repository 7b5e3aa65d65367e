//! メールソースのトレイト定義とモック対応
//!
//! 認証済みのメールソースを抽象化し、テスト時にモックへ置き換えられるようにする。
//! コアはメッセージの取得を行わず、このトレイト経由で受け取った構造だけを扱う。

use super::message::RawMessage;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// メールソースの操作を抽象化するトレイト
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MailSource: Send + Sync {
    /// 検索クエリに一致するメッセージIDを最大 max_results 件取得
    async fn list_message_ids(&self, query: &str, max_results: u32)
        -> Result<Vec<String>, String>;

    /// 単一メッセージ（ヘッダー + パーツツリー）を取得
    async fn get_message(&self, message_id: &str) -> Result<RawMessage, String>;
}
