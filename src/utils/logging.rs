/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。
/// 重复初始化时静默忽略。
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "porsi_lookup=debug,info"
        } else {
            "info"
        })
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 验证码门户查询");
    info!("🌐 查询页面: {}", config.portal_url);
    info!("📊 并发任务数: {}", config.worker_pool_size);
    info!(
        "🔁 每个任务最多尝试 {} 次，基础设施故障重试 {} 次",
        config.max_attempts, config.infra_max_retries
    );
    info!("{}", "=".repeat(60));
}

/// 记录入队信息
///
/// # 参数
/// - `total`: 入队任务数
/// - `workers`: 并发任务数
pub fn log_jobs_enqueued(total: usize, workers: usize) {
    info!("✓ 已入队 {} 个查询任务", total);
    info!("📋 最多同时执行 {} 个\n", workers);
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
pub fn print_final_stats(success: usize, failed: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部查询完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
}
