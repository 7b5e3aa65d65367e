use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod batch_runner;
pub mod config;
pub mod logic;
pub mod mail;
pub mod parsers;
pub mod repository;

use crate::batch_runner::BatchProgressEvent;
use crate::config::AppConfig;
use crate::logic::fetch_logic::{build_fetch_summary, FetchSummary};
use crate::logic::report_logic::{summarize_orders, OrderReport};
use crate::mail::MailSource;
use crate::parsers::order_parse_task::{run_order_fetch, OrderFetchContext};
use crate::repository::OrderRepository;

/// ロガーを初期化する
///
/// RUST_LOG が未指定なら、デバッグビルドでは Info、リリースビルドでは Warn 以上を出力する。
/// 時刻は IST で表示。2 回目以降の呼び出しは何もしない。
pub fn init_logger() {
    #[cfg(debug_assertions)]
    let default_level = log::LevelFilter::Info;
    #[cfg(not(debug_assertions))]
    let default_level = log::LevelFilter::Warn;

    let _ = env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5} {}] {}",
                chrono::Utc::now()
                    .with_timezone(&chrono_tz::Asia::Kolkata)
                    .format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}

/// メールソースから注文メールを取得・パースし、保存する
///
/// 1 通ごとの失敗は `failed` に数えて続行する。保存先への書き込み失敗だけが Err になる。
pub async fn fetch_orders<M, O>(
    mail_source: Arc<M>,
    order_repo: Arc<O>,
    config: &AppConfig,
    on_progress: impl Fn(&BatchProgressEvent),
) -> Result<FetchSummary, String>
where
    M: MailSource + 'static,
    O: OrderRepository + 'static,
{
    let context = OrderFetchContext {
        mail_source,
        order_repo,
        fetch: config.fetch.clone(),
        parse: config.parse.clone(),
    };

    let (total_emails, result) = run_order_fetch(context, || false, on_progress).await?;
    let summary = build_fetch_summary(
        total_emails,
        result.success_count,
        result.failed_count,
        &result.outputs,
    );

    log::info!("{}", summary.message);
    Ok(summary)
}

/// 保存済みの注文を集計する
pub async fn get_report<O>(order_repo: &O) -> Result<OrderReport, String>
where
    O: OrderRepository + ?Sized,
{
    let orders = order_repo.get_all_orders().await?;
    log::info!("Summarizing {} stored order(s)", orders.len());
    Ok(summarize_orders(&orders))
}

/// 保存済みの注文をすべて削除する
pub async fn clear_orders<O>(order_repo: &O) -> Result<u64, String>
where
    O: OrderRepository + ?Sized,
{
    let deleted = order_repo.clear_orders().await?;
    log::info!("Cleared {} order(s)", deleted);
    Ok(deleted)
}

/// 設定ディレクトリから設定を読み、DB ファイルのパスを解決する
pub fn load_config(config_dir: &Path) -> Result<(AppConfig, std::path::PathBuf), String> {
    let config = config::load(config_dir)?;
    let db_path = config.store.database_path(config_dir);
    Ok((config, db_path))
}
