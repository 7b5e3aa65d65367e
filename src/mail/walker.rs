//! MIME パーツツリーから text/plain と text/html の本文を集める
//!
//! 深さ優先・文書順でツリーをたどり、リーフの本文を base64 デコードして種類ごとに連結する。
//! multipart のサブタイプ（alternative / related / mixed）は区別せず、両方の本文を集める。
//!
//! # セキュリティガイドライン
//! - 本文の内容はログに出力しないこと（文字数・バイト数のみ）

use super::message::Part;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

/// 連結時の区切り（空行）
const SEGMENT_SEPARATOR: &str = "\n\n";

/// URL-safe / 標準どちらのアルファベットも、パディング有無も受け付けるデコーダ
/// （標準アルファベットは事前に URL-safe へ置換する）
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// 1 メッセージ分の抽出結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    /// text/plain パーツの連結（空行区切り）
    pub text: String,
    /// text/html パーツの連結。HTML パーツがなければ空
    pub html: String,
}

/// 走査のガード。どちらも None なら無制限（既定）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkLimits {
    /// 走査する最大深さ（ルート = 0）。これより深いパーツは無視する
    pub max_depth: Option<usize>,
    /// 1 パーツあたりのデコード後最大バイト数。超えるパーツは本文を無視する
    pub max_body_bytes: Option<usize>,
}

/// パーツツリーから本文を抽出する（ガードなし）
pub fn extract_all_parts(root: &Part) -> ExtractedText {
    extract_all_parts_with_limits(root, &WalkLimits::default())
}

/// パーツツリーから本文を抽出する
///
/// ルートが本文を直接持つ単一パートメッセージの場合も、ルート自身の MIME タイプで
/// リーフとして扱う。デコードに失敗したパーツは何も寄与せず、走査は続行する。
pub fn extract_all_parts_with_limits(root: &Part, limits: &WalkLimits) -> ExtractedText {
    let mut text_parts: Vec<String> = Vec::new();
    let mut html_parts: Vec<String> = Vec::new();

    traverse(root, 0, limits, &mut text_parts, &mut html_parts);

    log::debug!(
        "Walked MIME tree: {} plain part(s), {} html part(s)",
        text_parts.len(),
        html_parts.len()
    );

    ExtractedText {
        text: text_parts.join(SEGMENT_SEPARATOR),
        html: html_parts.join(SEGMENT_SEPARATOR),
    }
}

fn traverse(
    part: &Part,
    depth: usize,
    limits: &WalkLimits,
    text_parts: &mut Vec<String>,
    html_parts: &mut Vec<String>,
) {
    if limits.max_depth.is_some_and(|max| depth > max) {
        log::warn!("Skipping MIME part at depth {depth}: exceeds max_depth");
        return;
    }

    // コンテナは本文を持たない。子パーツへ無条件に降りる
    if !part.is_container() {
        if let Some(data) = part.body_data() {
            match mime_essence(&part.mime_type).as_str() {
                "text/plain" => {
                    if let Some(content) = decode_part_body(part, data, limits) {
                        text_parts.push(content);
                    }
                }
                "text/html" => {
                    if let Some(content) = decode_part_body(part, data, limits) {
                        html_parts.push(content);
                    }
                }
                other => log::debug!("Skipping mime_type: {other}"),
            }
        }
    }

    for child in &part.parts {
        traverse(child, depth + 1, limits, text_parts, html_parts);
    }
}

fn decode_part_body(part: &Part, data: &str, limits: &WalkLimits) -> Option<String> {
    if let Some(max) = limits.max_body_bytes {
        let estimated = estimated_decoded_len(data);
        if estimated > max {
            log::warn!(
                "Skipping {} body: ~{} bytes exceeds max_body_bytes={}",
                part.mime_type,
                estimated,
                max
            );
            return None;
        }
    }

    let charset = part.header("Content-Type").and_then(charset_param);
    let decoded = decode_body(data, charset.as_deref());
    if decoded.is_none() {
        log::warn!(
            "Base64 decode failed for {} part, input length: {}",
            part.mime_type,
            data.len()
        );
    }
    decoded
}

/// base64 本文をデコードして文字列にする
///
/// charset が指定され encoding_rs が知っているラベルならその文字コードで、
/// それ以外は UTF-8（不正シーケンスは置換文字）で解釈する。
/// base64 として不正なら None。
pub fn decode_body(data: &str, charset: Option<&str>) -> Option<String> {
    let normalized: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    let bytes = LENIENT_BASE64.decode(normalized.as_bytes()).ok()?;

    if let Some(encoding) =
        charset.and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
    {
        let (decoded, _, had_replacements) = encoding.decode(&bytes);
        if had_replacements {
            log::warn!(
                "{} decode had replacement chars; returning partial content",
                encoding.name()
            );
        }
        return Some(decoded.into_owned());
    }

    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// MIME タイプの本体部分（";" 以降のパラメータを除き小文字化）
fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Content-Type ヘッダーから charset パラメータを取り出す
fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

fn estimated_decoded_len(data: &str) -> usize {
    data.len() / 4 * 3
}
