//! 保存済み注文の集計
//!
//! 月別・店別・商品別の支出と、配達料・割引・注文時間帯の統計、直近の注文履歴を計算する。
//! 日時はすべて IST (Asia/Kolkata) に変換してから集計し、金額は小数点以下 2 桁に丸める。

use crate::repository::StoredOrder;
use chrono::{Datelike, Timelike};
use chrono_tz::Asia::Kolkata;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const TOP_RESTAURANTS: usize = 10;
const TOP_ITEMS: usize = 15;
const RECENT_MONTHS: usize = 6;
const HISTORY_LIMIT: usize = 50;
const NOT_AVAILABLE: &str = "N/A";
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_spent: Decimal,
    pub total_orders: usize,
    pub average_order_value: Decimal,
    pub total_delivery_fees: Decimal,
    pub total_discounts: Decimal,
    pub total_taxes: Decimal,
    /// 支出額が最大の店
    pub most_ordered_restaurant: String,
    /// 個数が最大の商品
    pub favorite_item: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySpend {
    /// "YYYY-MM"
    pub month: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSpend {
    pub name: String,
    pub value: Decimal,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCount {
    pub name: String,
    pub count: u64,
    /// 単価 × 個数（単価は抽出していないため通常 0）
    pub total_spent: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeStats {
    pub total: Decimal,
    pub average: Decimal,
    /// 0 より大きい値の件数
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourCount {
    pub hour: u32,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCount {
    pub day: String,
    pub orders: usize,
}

/// 曜日 × 時間帯の注文数（0 件のセルは含めない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub day: String,
    pub hour: u32,
    pub count: usize,
}

/// 注文履歴の 1 行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistoryEntry {
    /// メッセージID
    pub id: String,
    /// IST の "15 Mar 2024, 19:00"
    pub date: String,
    pub restaurant: String,
    /// "2x Raita, 1x Naan"。商品がなければ "N/A"
    pub items: String,
    pub amount: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub taxes: Decimal,
}

/// 集計結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReport {
    pub summary: ReportSummary,
    /// 月の昇順
    pub monthly: Vec<MonthlySpend>,
    /// 支出額の降順で上位 10 店
    pub restaurants: Vec<RestaurantSpend>,
    /// 個数の降順で上位 15 品
    pub top_items: Vec<ItemCount>,
    pub delivery_stats: FeeStats,
    pub discount_stats: FeeStats,
    /// 注文のあった時間帯のみ、昇順
    pub peak_hours: Vec<HourCount>,
    /// 月曜から日曜まで常に 7 件
    pub peak_days: Vec<DayCount>,
    /// 時間帯の昇順、同じ時間帯では月曜から
    pub heatmap: Vec<HeatmapCell>,
    /// `monthly` の末尾 6 か月
    pub last_six_months: Vec<MonthlySpend>,
    /// 新しい順に最大 50 件
    pub order_history: Vec<OrderHistoryEntry>,
}

fn money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        money(total / Decimal::from(count))
    }
}

fn fee_stats(values: impl Iterator<Item = Decimal>) -> FeeStats {
    let positive: Vec<Decimal> = values.filter(|v| *v > Decimal::ZERO).collect();
    let total: Decimal = positive.iter().copied().sum();
    FeeStats {
        total: money(total),
        average: average(total, positive.len()),
        count: positive.len(),
    }
}

/// キーの初出順を保ったまま値を積み上げる
struct Tally<V> {
    index: HashMap<String, usize>,
    entries: Vec<(String, V)>,
}

impl<V: Default> Tally<V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, key: &str) -> &mut V {
        let position = match self.index.get(key).copied() {
            Some(position) => position,
            None => {
                self.entries.push((key.to_string(), V::default()));
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }
}

fn describe_items(order: &StoredOrder) -> String {
    if order.record.items.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    order
        .record
        .items
        .iter()
        .map(|item| format!("{}x {}", item.quantity, item.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn history_entry(order: &StoredOrder) -> OrderHistoryEntry {
    let record = &order.record;
    OrderHistoryEntry {
        id: order.email_id.clone(),
        date: record
            .date
            .with_timezone(&Kolkata)
            .format("%d %b %Y, %H:%M")
            .to_string(),
        restaurant: record.restaurant.clone(),
        items: describe_items(order),
        amount: money(record.amount),
        delivery_fee: money(record.delivery_fee),
        discount: money(record.discount),
        taxes: money(record.taxes),
    }
}

/// 保存済みの注文を集計する
///
/// `orders` は新しい順を想定（同点時は先に現れたものが上位）。
pub fn summarize_orders(orders: &[StoredOrder]) -> OrderReport {
    let mut monthly: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut restaurants: Tally<(Decimal, usize)> = Tally::new();
    let mut items: Tally<(u64, Decimal)> = Tally::new();
    let mut hours: BTreeMap<u32, usize> = BTreeMap::new();
    let mut days = [0usize; 7];
    let mut grid = [[0usize; 7]; 24];

    for order in orders {
        let record = &order.record;
        let local = record.date.with_timezone(&Kolkata);

        *monthly
            .entry(local.format("%Y-%m").to_string())
            .or_insert(Decimal::ZERO) += record.amount;

        let restaurant = restaurants.entry(&record.restaurant);
        restaurant.0 += record.amount;
        restaurant.1 += 1;

        for item in &record.items {
            let tally = items.entry(&item.name);
            tally.0 += u64::from(item.quantity);
            tally.1 += item.price * Decimal::from(item.quantity);
        }

        let weekday = local.weekday().num_days_from_monday() as usize;
        *hours.entry(local.hour()).or_insert(0) += 1;
        days[weekday] += 1;
        grid[local.hour() as usize][weekday] += 1;
    }

    let mut restaurants: Vec<RestaurantSpend> = restaurants
        .entries
        .into_iter()
        .map(|(name, (value, orders))| RestaurantSpend {
            name,
            value: money(value),
            orders,
        })
        .collect();
    restaurants.sort_by(|a, b| b.value.cmp(&a.value));
    restaurants.truncate(TOP_RESTAURANTS);

    let mut top_items: Vec<ItemCount> = items
        .entries
        .into_iter()
        .map(|(name, (count, total_spent))| ItemCount {
            name,
            count,
            total_spent: money(total_spent),
        })
        .collect();
    top_items.sort_by(|a, b| b.count.cmp(&a.count));
    top_items.truncate(TOP_ITEMS);

    let delivery_stats = fee_stats(orders.iter().map(|o| o.record.delivery_fee));
    let discount_stats = fee_stats(orders.iter().map(|o| o.record.discount));
    let total_spent: Decimal = orders.iter().map(|o| o.record.amount).sum();
    let total_taxes: Decimal = orders.iter().map(|o| o.record.taxes).sum();

    let summary = ReportSummary {
        total_spent: money(total_spent),
        total_orders: orders.len(),
        average_order_value: average(total_spent, orders.len()),
        total_delivery_fees: delivery_stats.total,
        total_discounts: discount_stats.total,
        total_taxes: money(total_taxes),
        most_ordered_restaurant: restaurants
            .first()
            .map(|r| r.name.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        favorite_item: top_items
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    };

    let monthly: Vec<MonthlySpend> = monthly
        .into_iter()
        .map(|(month, amount)| MonthlySpend {
            month,
            amount: money(amount),
        })
        .collect();
    let last_six_months = monthly[monthly.len().saturating_sub(RECENT_MONTHS)..].to_vec();

    let heatmap = grid
        .iter()
        .enumerate()
        .flat_map(|(hour, row)| {
            WEEKDAYS
                .iter()
                .zip(row)
                .filter(|(_, count)| **count > 0)
                .map(move |(day, count)| HeatmapCell {
                    day: day.to_string(),
                    hour: hour as u32,
                    count: *count,
                })
        })
        .collect();

    OrderReport {
        summary,
        monthly,
        restaurants,
        top_items,
        delivery_stats,
        discount_stats,
        peak_hours: hours
            .into_iter()
            .map(|(hour, orders)| HourCount { hour, orders })
            .collect(),
        peak_days: WEEKDAYS
            .iter()
            .zip(days)
            .map(|(day, orders)| DayCount {
                day: day.to_string(),
                orders,
            })
            .collect(),
        heatmap,
        last_six_months,
        order_history: orders.iter().take(HISTORY_LIMIT).map(history_entry).collect(),
    }
}
