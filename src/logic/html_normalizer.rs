//! HTML 本文を正規表現抽出向けのプレーンテキストに変換する
//!
//! DOM パースは行わず、順序付きの置換を順番に適用するだけの変換パイプライン。
//! 表のセル・行境界は " | " 区切りと改行になり、"Label | Value" の形で走査できるようになる。
//! 後の置換は前の置換が済んでいることを前提にしているため、順序を入れ替えないこと。
//! 不正なマークアップでも失敗はせず、削りすぎ・削り残しになるだけ。

use once_cell::sync::Lazy;
use regex::Regex;

/// (パターン, 置換文字列) を適用順に並べたもの
const SUBSTITUTION_STEPS: &[(&str, &str)] = &[
    // 1. 表の行・セル境界
    (r"(?i)<tr[^>]*>", "\n"),
    (r"(?i)</tr>", "\n"),
    (r"(?i)<td[^>]*>", " "),
    (r"(?i)</td>", " | "),
    (r"(?i)<th[^>]*>", " "),
    (r"(?i)</th>", " | "),
    // 2. 改行
    (r"(?i)<br[^>]*>", "\n"),
    (r"(?i)</p>", "\n"),
    (r"(?i)</div>", "\n"),
    (r"(?i)</h[1-6]>", "\n"),
    // 3. style / script ブロックは中身ごと削除
    (r"(?is)<style[^>]*>.*?</style>", ""),
    (r"(?is)<script[^>]*>.*?</script>", ""),
    // 4. エンティティ
    (r"(?i)&nbsp;", " "),
    (r"(?i)&amp;", "&"),
    (r"(?i)&lt;", "<"),
    (r"(?i)&gt;", ">"),
    (r"(?i)&quot;", "\""),
    (r"(?i)&#39;", "'"),
    (r"(?i)&#8377;", "₹"),
    (r"(?i)&rsquo;", "'"),
    (r"(?i)&hellip;", "..."),
    // 5. 残りのタグ
    (r"<[^>]+>", " "),
    // 6. 空白・区切りの整理
    (r"\s+", " "),
    (r" \| \|", " |"),
    (r"\|\s*\|", "|"),
    (r"\n\s*\n\s*\n", "\n\n"),
];

static SUBSTITUTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    SUBSTITUTION_STEPS
        .iter()
        .map(|(pattern, replacement)| {
            let re = Regex::new(pattern).expect(
                "Failed to compile HTML substitution pattern - this is a static pattern and should never fail",
            );
            (re, *replacement)
        })
        .collect()
});

/// HTML をプレーンテキストに近い形へ変換する
///
/// 空文字列を渡した場合は空文字列を返す（HTML パーツがないメッセージの既定動作）。
pub fn normalize_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let text = SUBSTITUTIONS
        .iter()
        .fold(html.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        });

    text.trim().to_string()
}
