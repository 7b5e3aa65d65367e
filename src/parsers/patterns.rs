//! (パターン, 検証) の組を左から順に評価するためのルール型
//!
//! サービスごとの表はこのモジュールの型を並べただけのデータで、制御フローは持たない。
//! 最初に検証を通った一致で打ち切る。表の順序がそのまま優先度になる。

use super::OrderItem;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect(
        "Failed to compile whitespace regex pattern - this is a static pattern and should never fail",
    )
});

/// 店名候補の末尾に付くステータス語（"was delivered successfully" 等）
static TRAILING_STATUS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(was|has|is|delivered|successfully).*$").expect(
        "Failed to compile status word regex pattern - this is a static pattern and should never fail",
    )
});

/// 店名として受け付ける文字数
const RESTAURANT_MIN_CHARS: usize = 3;
const RESTAURANT_MAX_CHARS: usize = 60;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("Invalid static pattern {pattern:?}: {e}"))
}

/// 数値の妥当範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    min: Decimal,
    max: Decimal,
    inclusive: bool,
}

impl Band {
    /// min <= v <= max
    pub const fn inclusive(min: Decimal, max: Decimal) -> Self {
        Self {
            min,
            max,
            inclusive: true,
        }
    }

    /// min < v < max
    pub const fn exclusive(min: Decimal, max: Decimal) -> Self {
        Self {
            min,
            max,
            inclusive: false,
        }
    }

    pub fn contains(&self, value: Decimal) -> bool {
        if self.inclusive {
            self.min <= value && value <= self.max
        } else {
            self.min < value && value < self.max
        }
    }
}

/// 金額系フィールドのルール。キャプチャ 1 が数値
#[derive(Debug, Clone)]
pub struct NumericRule {
    pattern: Regex,
    band: Band,
}

impl NumericRule {
    pub fn new(pattern: &str, band: Band) -> Self {
        Self {
            pattern: compile(pattern),
            band,
        }
    }

    /// 最初の一致だけを見る。範囲外・数値化できない場合は None
    pub fn evaluate(&self, text: &str) -> Option<Decimal> {
        let captures = self.pattern.captures(text)?;
        let value = parse_amount(captures.get(1)?.as_str())?;
        self.band.contains(value).then_some(value)
    }
}

/// ルールを順に試し、最初に範囲内だった値を返す
pub fn first_accepted(rules: &[NumericRule], text: &str) -> Option<Decimal> {
    rules.iter().find_map(|rule| rule.evaluate(text))
}

/// "1,234.50" のような数値文字列を Decimal にする
///
/// 桁区切りのカンマを除去し、末尾に残った "." も落とす。
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.strip_suffix('.').unwrap_or(&cleaned);
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned).ok()
}

/// 店名のルール。キャプチャ 1 が候補
#[derive(Debug, Clone)]
pub struct RestaurantRule {
    pattern: Regex,
}

impl RestaurantRule {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: compile(pattern),
        }
    }

    /// 最初の一致を整形し、長さ条件を満たせば返す
    pub fn evaluate(&self, text: &str) -> Option<String> {
        let captures = self.pattern.captures(text)?;
        let name = clean_restaurant_name(captures.get(1)?.as_str());
        let len = name.chars().count();
        (RESTAURANT_MIN_CHARS..=RESTAURANT_MAX_CHARS)
            .contains(&len)
            .then_some(name)
    }
}

/// ルールを順に試し、最初に受け付けた店名を返す
pub fn first_restaurant(rules: &[RestaurantRule], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| rule.evaluate(text))
}

/// 店名候補を整形する（trim、空白の圧縮、末尾のステータス語の除去）
pub fn clean_restaurant_name(raw: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    TRAILING_STATUS_RE.replace(&collapsed, "").into_owned()
}

/// "<個数> x <商品名>" を本文全体から拾うルール
///
/// パターンのキャプチャ 1 が個数、2 が商品名。商品名の直後の区切り（₹ / | / < / 改行 / 末尾）は
/// 次の一致の先頭としても使えるよう、商品名の終端から次の検索を再開する。
#[derive(Debug, Clone)]
pub struct ItemRule {
    pattern: Regex,
    /// 個数の上限（この値未満）
    max_quantity: u32,
    /// 商品名の最小文字数（この値より長いこと）
    min_name_chars: usize,
}

impl ItemRule {
    pub fn new(pattern: &str, max_quantity: u32, min_name_chars: usize) -> Self {
        Self {
            pattern: compile(pattern),
            max_quantity,
            min_name_chars,
        }
    }

    /// 重ならないすべての一致を出現順に集める。単価は常に 0
    pub fn collect(&self, text: &str) -> Vec<OrderItem> {
        let mut items = Vec::new();
        let mut start = 0;

        while start <= text.len() {
            let Some(captures) = self.pattern.captures_at(text, start) else {
                break;
            };
            let (Some(quantity), Some(name)) = (captures.get(1), captures.get(2)) else {
                break;
            };
            start = name.end();

            let Ok(quantity) = quantity.as_str().parse::<u32>() else {
                continue;
            };
            let name = WHITESPACE_RE.replace_all(name.as_str().trim(), " ").into_owned();
            if quantity > 0
                && quantity < self.max_quantity
                && name.chars().count() > self.min_name_chars
            {
                items.push(OrderItem {
                    name,
                    quantity,
                    price: Decimal::ZERO,
                });
            }
        }

        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const NUMBER: &str = r"([0-9][0-9,]*\.?[0-9]{0,2})";

    // ==================== Band Tests ====================

    #[test]
    fn test_band_inclusive_edges() {
        let band = Band::inclusive(dec!(20), dec!(50000));
        assert!(band.contains(dec!(20)));
        assert!(band.contains(dec!(50000)));
        assert!(!band.contains(dec!(19.99)));
        assert!(!band.contains(dec!(50000.01)));
    }

    #[test]
    fn test_band_exclusive_edges() {
        let band = Band::exclusive(dec!(0), dec!(500));
        assert!(!band.contains(dec!(0)));
        assert!(!band.contains(dec!(500)));
        assert!(band.contains(dec!(0.5)));
        assert!(band.contains(dec!(499.99)));
    }

    // ==================== parse_amount Tests ====================

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("450.00"), Some(dec!(450.00)));
        assert_eq!(parse_amount("1,234.5"), Some(dec!(1234.5)));
        assert_eq!(parse_amount("12,00,000"), Some(dec!(1200000)));
        assert_eq!(parse_amount("299."), Some(dec!(299)));
        assert_eq!(parse_amount(","), None);
        assert_eq!(parse_amount(""), None);
    }

    // ==================== NumericRule Tests ====================

    #[test]
    fn test_numeric_rule_rejects_out_of_band() {
        let rule = NumericRule::new(
            &format!(r"(?i)Total[:\s]*₹?\s*{NUMBER}"),
            Band::inclusive(dec!(20), dec!(50000)),
        );
        assert_eq!(rule.evaluate("Total: ₹450"), Some(dec!(450)));
        assert_eq!(rule.evaluate("Total ₹ 75000"), None);
        assert_eq!(rule.evaluate("nothing here"), None);
    }

    #[test]
    fn test_numeric_rule_only_considers_first_match() {
        let rule = NumericRule::new(
            &format!(r"(?i)Total[:\s]*{NUMBER}"),
            Band::inclusive(dec!(20), dec!(50000)),
        );
        // 最初の一致が範囲外なら、後ろの一致は見ずに次のルールへ
        assert_eq!(rule.evaluate("Total 5 ... Total 300"), None);
    }

    #[test]
    fn test_first_accepted_falls_through() {
        let band = Band::inclusive(dec!(20), dec!(50000));
        let rules = vec![
            NumericRule::new(&format!(r"(?i)Total[:\s]*{NUMBER}"), band),
            NumericRule::new(&format!(r"(?i)Paid[:\s]*{NUMBER}"), band),
        ];
        assert_eq!(first_accepted(&rules, "Total 99999 Paid 120"), Some(dec!(120)));
        assert_eq!(first_accepted(&rules, "Total 99999 Paid 10"), None);
    }

    // ==================== RestaurantRule Tests ====================

    #[test]
    fn test_clean_restaurant_name() {
        assert_eq!(clean_restaurant_name("  Meghana   Foods  "), "Meghana Foods");
        assert_eq!(
            clean_restaurant_name("Truffles was delivered successfully"),
            "Truffles"
        );
        assert_eq!(clean_restaurant_name("Empire Restaurant"), "Empire Restaurant");
    }

    #[test]
    fn test_restaurant_rule_length_check() {
        let rule = RestaurantRule::new(r"(?i)from\s+([^\n]+)");
        assert_eq!(rule.evaluate("from Leon Grill").as_deref(), Some("Leon Grill"));
        assert_eq!(rule.evaluate("from AB"), None);
        assert_eq!(rule.evaluate(&format!("from {}", "x".repeat(61))), None);
    }

    #[test]
    fn test_first_restaurant_priority() {
        let rules = vec![
            RestaurantRule::new(r"(?i)order from ([^\n.]+)"),
            RestaurantRule::new(r"(?i)restaurant: ([^\n.]+)"),
        ];
        assert_eq!(
            first_restaurant(&rules, "Restaurant: Second\norder from First.").as_deref(),
            Some("First")
        );
        assert_eq!(
            first_restaurant(&rules, "Restaurant: Second\n").as_deref(),
            Some("Second")
        );
        assert_eq!(first_restaurant(&rules, "nothing"), None);
    }

    // ==================== ItemRule Tests ====================

    fn item_rule() -> ItemRule {
        ItemRule::new(
            r"(?i)(?:^|\n|\|)\s*([0-9]+)\s*[×x]\s*([A-Za-z][^₹\n|<]{2,70}?)\s*(?:₹|\||<|\n|$)",
            50,
            2,
        )
    }

    #[test]
    fn test_item_rule_collects_in_order() {
        let items = item_rule().collect("2 x Paneer Tikka ₹180\n1 x Naan ₹40");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Paneer Tikka");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[1].name, "Naan");
        assert_eq!(items[1].quantity, 1);
        assert!(items.iter().all(|item| item.price == Decimal::ZERO));
    }

    #[test]
    fn test_item_rule_shares_pipe_separator_between_matches() {
        let items = item_rule().collect("Items | 1 x Veg Biryani | 3 × Gulab Jamun | ₹ 420 |");
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Veg Biryani", "Gulab Jamun"]);
        assert_eq!(items[1].quantity, 3);
    }

    #[test]
    fn test_item_rule_quantity_bounds() {
        let items = item_rule().collect("0 x Water Bottle\n50 x Party Pack\n49 x Momos\n");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Momos");
        assert_eq!(items[0].quantity, 49);
    }

    #[test]
    fn test_item_rule_requires_line_start_or_separator() {
        assert!(item_rule().collect("Order 2 x Dosa\n").is_empty());
        assert!(item_rule().collect("no items here").is_empty());
    }
}
