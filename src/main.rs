use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mock_exam::orchestrator::server;
use mock_exam::utils::logging;
use mock_exam::{App, Config};

/// 终端模拟考试
#[derive(Parser, Debug)]
#[command(name = "mock-exam", version, about, long_about = None)]
struct Cli {
    /// TOML 配置文件（不指定时只读环境变量）
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 显示 debug 日志
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// 交互式考试（默认）
    Chat,
    /// 启动文档服务
    Serve {
        /// 监听地址，默认取配置中的 server_addr
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("加载配置文件失败: {}", path.display()))?,
        None => Config::from_env(),
    };

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);
    logging::log_startup(&config);

    match cli.command.unwrap_or(Mode::Chat) {
        Mode::Chat => {
            let app = App::initialize(config)?;
            app.run().await
        }
        Mode::Serve { addr } => {
            let addr = match addr {
                Some(addr) => addr,
                None => config
                    .server_addr
                    .parse()
                    .with_context(|| format!("无效的监听地址: {}", config.server_addr))?,
            };
            server::serve(addr).await
        }
    }
}
