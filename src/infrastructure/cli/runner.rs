//! CLI Runner - 组装适配器并执行子命令
//!
//! stdout 只输出产物路径（或 history 的查询结果），提示信息一律写 stderr。

use std::ffi::OsString;
use std::io::{IsTerminal, Read};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::args::{Commands, GenerateArgs, HistoryAction};
use super::render;
use crate::application::{
    ApplicationError, AudioPlayerPort, GenerateMusicCommand, GenerateMusicHandler,
    GenerateMusicHandlerConfig, GenerateMusicResponse, GenerationClient, GenerationClientConfig,
    GetHistoryItem, GetHistoryItemHandler, ListHistory, ListHistoryHandler, MusicEnginePort,
    OutputTarget, ReplayHistoryHandler, ReplayHistoryItem, RerunGenerationCommand,
    RerunGenerationHandler,
};
use crate::config::{user_config_path, write_template, AppConfig, EngineKind, InitOutcome};
use crate::infrastructure::adapters::{
    CommandAudioPlayer, FakeMusicClient, FfmpegEncoder, FileArtifactStorage,
    GeminiAssistantConfig, GeminiPromptAssistant, LyriaClient, LyriaClientConfig, ToneConfig,
};
use crate::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteHistoryRepository,
};

/// 已组装好的命令/查询处理器
pub struct App {
    generate: Arc<GenerateMusicHandler>,
    rerun: RerunGenerationHandler,
    replay: ReplayHistoryHandler,
    list: ListHistoryHandler,
    get: GetHistoryItemHandler,
}

impl App {
    /// 按配置创建全部适配器
    ///
    /// `optimize` 为 true 时额外接入 Gemini prompt 改写。
    pub async fn build(
        config: &AppConfig,
        optimize: bool,
        cancel: CancellationToken,
    ) -> Result<Self, ApplicationError> {
        let storage = Arc::new(
            FileArtifactStorage::new(&config.storage.output_dir)
                .await
                .map_err(|e| ApplicationError::Write(e.to_string()))?,
        );

        let history_path = &config.storage.history_path;
        if let Some(parent) = history_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ApplicationError::Repository(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let pool = create_pool(&DatabaseConfig::new(history_path))
            .await
            .map_err(|e| ApplicationError::Repository(e.to_string()))?;
        run_migrations(&pool)
            .await
            .map_err(|e| ApplicationError::Repository(e.to_string()))?;
        let history_repo = Arc::new(SqliteHistoryRepository::new(pool));

        let player: Arc<dyn AudioPlayerPort> =
            Arc::new(CommandAudioPlayer::new(config.playback.player.clone()));

        let client = GenerationClient::new(
            build_engine(config),
            GenerationClientConfig {
                retry_backoff: Duration::from_millis(config.generation.retry_backoff_ms),
                max_retries: 1,
            },
        );

        let mut generate = GenerateMusicHandler::new(
            client,
            storage.clone(),
            history_repo.clone(),
            player.clone(),
            GenerateMusicHandlerConfig {
                timeout: Duration::from_secs(config.generation.timeout_secs),
            },
            cancel,
        )
        .with_encoder(Arc::new(FfmpegEncoder::new(config.encoder.program.clone())));
        if optimize {
            let assistant = GeminiPromptAssistant::new(GeminiAssistantConfig {
                base_url: config.assistant.base_url.clone(),
                model: config.assistant.model.clone(),
                api_key: config.google.api_key.clone(),
                ..Default::default()
            })?;
            generate = generate.with_assistant(Arc::new(assistant));
        }
        let generate = Arc::new(generate);

        Ok(Self {
            rerun: RerunGenerationHandler::new(
                history_repo.clone(),
                storage.clone(),
                generate.clone(),
            ),
            replay: ReplayHistoryHandler::new(history_repo.clone(), storage.clone(), player),
            list: ListHistoryHandler::new(history_repo.clone(), storage.clone()),
            get: GetHistoryItemHandler::new(history_repo, storage),
            generate,
        })
    }
}

/// 按 `engine.kind` 选择生成引擎
fn build_engine(config: &AppConfig) -> Arc<dyn MusicEnginePort> {
    match config.engine.kind {
        EngineKind::Lyria => {
            let google = &config.google;
            Arc::new(LyriaClient::new(LyriaClientConfig {
                api_key: google.api_key.clone(),
                access_token: google.access_token.clone(),
                project_id: google.project_id.clone(),
                location: google.location.clone(),
                model_id: google.model_id.clone(),
                endpoint: google.endpoint.clone(),
                default_temperature: config.generation.temperature,
                ..Default::default()
            }))
        }
        EngineKind::Tone => {
            tracing::info!("Using offline tone engine");
            Arc::new(FakeMusicClient::tone(ToneConfig::default()))
        }
    }
}

/// 执行 `generate` / `history` 子命令
pub async fn run(
    command: Commands,
    config: &AppConfig,
    cancel: CancellationToken,
) -> Result<(), ApplicationError> {
    match command {
        Commands::Generate(args) => run_generate(args, config, cancel).await,
        Commands::History { action } => run_history(action, config, cancel).await,
        Commands::Init { force } => run_init(force),
    }
}

/// `init`：写入用户级配置模板，已存在时保持原样
pub fn run_init(force: bool) -> Result<(), ApplicationError> {
    let path = user_config_path();
    match write_template(&path, force)
        .map_err(|e| ApplicationError::Configuration(e.to_string()))?
    {
        InitOutcome::Created(path) => {
            eprintln!("Wrote config template to {}", path.display());
            eprintln!("Set google.api_key (or GOOGLE_API_KEY) before generating.");
        }
        InitOutcome::AlreadyExists(path) => {
            eprintln!(
                "Config already exists at {} (use --force to overwrite)",
                path.display()
            );
        }
    }
    Ok(())
}

async fn run_generate(
    args: GenerateArgs,
    config: &AppConfig,
    cancel: CancellationToken,
) -> Result<(), ApplicationError> {
    // prompt 在连接任何后端之前解析，输入错误不会触碰数据库
    let prompt = match args.rerun {
        Some(index) => {
            if args.prompt.is_some() {
                tracing::warn!(
                    index = index,
                    "Prompt argument ignored when re-running a history item"
                );
            }
            None
        }
        None => Some(resolve_prompt(args.prompt.clone())?),
    };

    let app = App::build(config, args.optimize, cancel).await?;
    let output = output_target(&args);
    let play = args.play || args.temp;

    let response = match (args.rerun, prompt) {
        (Some(index), _) => {
            app.rerun
                .handle(RerunGenerationCommand {
                    index,
                    output,
                    format: args.format,
                    play,
                })
                .await?
        }
        (None, prompt) => {
            app.generate
                .handle(GenerateMusicCommand {
                    prompt: prompt.unwrap_or_default(),
                    duration_secs: args
                        .duration
                        .unwrap_or(config.generation.default_duration_secs),
                    bpm: args.bpm.unwrap_or(config.generation.default_bpm),
                    seed: args.seed,
                    temperature: args.temperature,
                    style: args.style,
                    output,
                    format: args.format.unwrap_or(config.generation.format),
                    play,
                    optimize: args.optimize,
                })
                .await?
        }
    };

    report(&response);
    Ok(())
}

/// `generate --background`：在父进程解析 prompt，随后以脱离终端的子进程重新执行
pub fn run_background(args: GenerateArgs, config_path: Option<&Path>) -> Result<(), ApplicationError> {
    let prompt = match args.rerun {
        Some(_) => None,
        None => Some(resolve_prompt(args.prompt.clone())?),
    };

    let exe = std::env::current_exe()
        .map_err(|e| ApplicationError::internal(format!("cannot locate executable: {}", e)))?;
    let mut command = std::process::Command::new(&exe);
    command
        .args(background_argv(&args, prompt.as_deref(), config_path))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // 独立进程组，终端的 Ctrl-C 不会传到子进程
        command.process_group(0);
    }

    let child = command
        .spawn()
        .map_err(|e| ApplicationError::internal(format!("cannot start background process: {}", e)))?;
    tracing::info!(pid = child.id(), "Background generation started");
    eprintln!("Launching generation in background (pid {})", child.id());
    Ok(())
}

/// 子进程的完整参数，不含 `--background`；prompt 放在 `--` 之后
fn background_argv(
    args: &GenerateArgs,
    prompt: Option<&str>,
    config_path: Option<&Path>,
) -> Vec<OsString> {
    let mut argv: Vec<OsString> = Vec::new();
    if let Some(path) = config_path {
        argv.push("--config".into());
        argv.push(path.as_os_str().to_os_string());
    }
    argv.push("generate".into());

    let mut push = |flag: &str, value: Option<String>| {
        if let Some(value) = value {
            argv.push(flag.into());
            argv.push(value.into());
        }
    };
    push("--duration", args.duration.map(|d| d.to_string()));
    push("--bpm", args.bpm.map(|b| b.to_string()));
    push("--seed", args.seed.map(|s| s.to_string()));
    push("--temperature", args.temperature.map(|t| t.to_string()));
    push("--style", args.style.clone());
    push("--format", args.format.map(|f| f.to_string()));
    push("--rerun", args.rerun.map(|i| i.to_string()));

    if let Some(path) = &args.output {
        argv.push("--output".into());
        argv.push(path.as_os_str().to_os_string());
    }
    for (flag, set) in [
        ("--play", args.play),
        ("--optimize", args.optimize),
        ("--temp", args.temp),
    ] {
        if set {
            argv.push(flag.into());
        }
    }

    if let Some(prompt) = prompt {
        argv.push("--".into());
        argv.push(prompt.into());
    }
    argv
}

fn report(response: &GenerateMusicResponse) {
    if let Some(record) = &response.record {
        if let Some(source) = &record.source_prompt {
            eprintln!("Prompt: {}", record.request.prompt());
            tracing::debug!(original = %source, "Prompt was rewritten");
        }
        println!("{}", response.artifact.path.display());
    }
    eprintln!("{}", render::generation_summary(response));
    if let Some(err) = &response.playback_error {
        eprintln!("warning: playback failed: {}", err);
    }
}

async fn run_history(
    action: Option<HistoryAction>,
    config: &AppConfig,
    cancel: CancellationToken,
) -> Result<(), ApplicationError> {
    let app = App::build(config, false, cancel).await?;

    match action.unwrap_or(HistoryAction::List { json: false }) {
        HistoryAction::List { json } => {
            let entries = app.list.handle(ListHistory).await?;
            if json {
                println!("{}", to_json(&entries)?);
            } else {
                print!("{}", render::history_table(&entries));
            }
        }
        HistoryAction::Show { index, json } => {
            let entry = app.get.handle(GetHistoryItem { index }).await?;
            if json {
                println!("{}", to_json(&entry)?);
            } else {
                print!("{}", render::history_detail(&entry));
            }
        }
        HistoryAction::Play { index } => {
            let record = app.replay.handle(ReplayHistoryItem { index }).await?;
            eprintln!("Played #{}: {}", record.index, record.output_path.display());
        }
    }
    Ok(())
}

fn output_target(args: &GenerateArgs) -> OutputTarget {
    if args.temp {
        OutputTarget::Temporary
    } else if let Some(path) = &args.output {
        OutputTarget::Path(path.clone())
    } else {
        OutputTarget::Auto
    }
}

/// 命令行参数优先，否则从管道读取 stdin
fn resolve_prompt(arg: Option<String>) -> Result<String, ApplicationError> {
    if let Some(prompt) = arg {
        return Ok(prompt);
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(ApplicationError::invalid_request(
            "no prompt given (pass PROMPT or pipe it on stdin)",
        ));
    }
    let mut buf = String::new();
    stdin
        .lock()
        .read_to_string(&mut buf)
        .map_err(|e| ApplicationError::invalid_request(format!("cannot read stdin: {}", e)))?;
    Ok(buf)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApplicationError> {
    serde_json::to_string_pretty(value).map_err(|e| ApplicationError::internal(e.to_string()))
}
