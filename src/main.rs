//! gen-music - 文本生成音乐命令行工具
//!
//! 启动顺序: 解析参数 → (init 直接执行) → 加载配置 → 初始化日志
//! → (generate --background 交给子进程) → 执行子命令

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gen_music::application::ApplicationError;
use gen_music::config::{load_config, print_config, LogConfig};
use gen_music::infrastructure::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // init 不依赖现有配置（配置本身可能还不存在或有误）
    if let Commands::Init { force } = cli.command {
        init_tracing(&LogConfig::default(), cli.verbose);
        return exit_on_error(cli::run_init(force));
    }

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LogConfig::default(), cli.verbose);
            return exit_on_error(Err(ApplicationError::Configuration(e.to_string())));
        }
    };

    init_tracing(&config.log, cli.verbose);
    print_config(&config);

    if let Commands::Generate(args) = &cli.command {
        if args.background {
            return exit_on_error(cli::run_background(args.clone(), cli.config.as_deref()));
        }
    }

    // Ctrl-C 取消正在进行的生成，已写入的部分文件由存储层清理
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received interrupt signal");
            signal_token.cancel();
        }
    });

    exit_on_error(cli::run(cli.command, &config, cancel).await)
}

/// 日志写 stderr，`RUST_LOG` 优先于配置与 `-v`
fn init_tracing(log: &LogConfig, verbose: u8) {
    let level = match verbose {
        0 => log.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let log_filter = format!("{},gen_music={}", level, level);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn exit_on_error(result: Result<(), ApplicationError>) -> anyhow::Result<()> {
    if let Err(e) = result {
        tracing::debug!(error = ?e, "Command failed");
        eprintln!("error: {}", e);
        if let Some(hint) = e.hint() {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(e.exit_code());
    }
    Ok(())
}
