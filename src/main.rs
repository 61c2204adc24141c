use anyhow::{bail, Context, Result};
use porsi_lookup::utils::logging;
use porsi_lookup::{App, Config};

const USAGE: &str = "用法:\n  porsi_lookup <查询编号>...      入队查询并等待结果\n  porsi_lookup records <查询编号>  列出任务记录与历史";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load().context("加载配置失败")?;

    // 初始化日志
    logging::init(config.verbose_logging);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        bail!("{}", USAGE);
    }

    // 初始化应用
    let app = App::initialize(config)
        .await
        .context("初始化应用失败")?;

    match args.first().map(String::as_str) {
        Some("records") => {
            let Some(query_key) = args.get(1) else {
                bail!("{}", USAGE);
            };
            let records = app.records(query_key.trim()).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            let reports = app.run(&args).await?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    app.shutdown().await;
    Ok(())
}
