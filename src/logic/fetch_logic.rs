//! 注文メール取得バッチの純粋なヘルパー
//!
//! I/O を伴わない部分（ID の重複除去、本文の結合、日付の解決、集計結果の組み立て）をここに置く。

use crate::logic::html_normalizer::normalize_html;
use crate::mail::ExtractedText;
use crate::parsers::Source;
use crate::repository::StoredOrder;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Date ヘッダー末尾のタイムゾーン注記（例: "(IST)"）
static TRAILING_COMMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\([^)]*\)\s*$").expect(
        "Failed to compile date comment regex pattern - this is a static pattern and should never fail",
    )
});

/// メッセージ ID を最初に現れた順序のまま重複除去する
pub fn dedupe_message_ids<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// プレーンテキストと正規化済み HTML を結合した抽出対象の本文
pub fn combine_body(extracted: &ExtractedText) -> String {
    let html_text = normalize_html(&extracted.html);
    format!("{}\n\n{}", extracted.text, html_text)
        .trim()
        .to_string()
}

/// 本文が抽出対象として十分な長さか
pub fn has_enough_body(body: &str, min_chars: usize) -> bool {
    !body.is_empty() && body.chars().count() >= min_chars
}

/// Date ヘッダーを日時に変換する
///
/// RFC 2822（末尾の "(IST)" のような注記は無視）、次に RFC 3339 を試す。
/// どちらでも読めない、またはヘッダーがない場合は `now` を返す。
pub fn resolve_message_date(header: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = header.map(str::trim).filter(|v| !v.is_empty()) else {
        return now;
    };

    let without_comment = TRAILING_COMMENT_RE.replace(raw, "");
    DateTime::parse_from_rfc2822(&without_comment)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::debug!("Unparseable Date header '{}': {}", raw, e);
            now
        })
}

/// サービス別の保存件数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBreakdown {
    pub zomato: usize,
    pub swiggy: usize,
}

/// 取得バッチの結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchSummary {
    /// 重複除去後の候補メール数
    pub total_emails: usize,
    /// 注文として抽出できた数
    pub processed: usize,
    /// 取得失敗・本文なし・金額なしの数
    pub failed: usize,
    /// 保存した注文数
    pub stored: usize,
    /// 保存した注文の合計金額（小数点以下 2 桁）
    pub total_amount: Decimal,
    pub breakdown: SourceBreakdown,
    pub message: String,
}

/// 取得バッチの集計結果を組み立てる
pub fn build_fetch_summary(
    total_emails: usize,
    processed: usize,
    failed: usize,
    stored: &[StoredOrder],
) -> FetchSummary {
    let count_of = |source: Source| {
        stored
            .iter()
            .filter(|order| order.record.source == source)
            .count()
    };
    let breakdown = SourceBreakdown {
        zomato: count_of(Source::Zomato),
        swiggy: count_of(Source::Swiggy),
    };
    let total_amount = stored
        .iter()
        .map(|order| order.record.amount)
        .sum::<Decimal>()
        .round_dp(2);

    let message = format!(
        "Processed {} orders ({} Zomato, {} Swiggy). Total: ₹{:.2}",
        processed, breakdown.zomato, breakdown.swiggy, total_amount
    );

    FetchSummary {
        total_emails,
        processed,
        failed,
        stored: stored.len(),
        total_amount,
        breakdown,
        message,
    }
}
