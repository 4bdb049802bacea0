//! Generate Command Handlers
//!
//! 一次生成的完整编排:
//! 校验 → (可选) 改写 prompt → 占用输出路径 → 建立会话 → 拼接并原子落盘
//! → (可选) 转码 → 追加历史 → (可选) 播放
//!
//! 先写产物再写历史；历史写入失败时删除刚写好的产物。
//! 自动命名的路径在生成前就被占用，生成失败时释放。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::application::commands::{
    GenerateMusicCommand, GenerateMusicResponse, OutputTarget, RerunGenerationCommand,
};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ArtifactStoragePort, AudioEncoderPort, AudioPlayerPort, HistoryRepositoryPort,
    PromptAssistantPort,
};
use crate::application::services::{GenerationClient, RunLimits, StreamAssembler};
use crate::domain::generation::{GeneratedArtifact, GenerationRequest, OutputFormat};
use crate::domain::history::{HistoryRecord, NewHistoryRecord};

/// Handler 配置
#[derive(Debug, Clone)]
pub struct GenerateMusicHandlerConfig {
    /// 整体生成超时（建立会话 + 拼接）
    pub timeout: Duration,
}

impl Default for GenerateMusicHandlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
        }
    }
}

/// GenerateMusic Handler
pub struct GenerateMusicHandler {
    client: GenerationClient,
    assembler: StreamAssembler,
    storage: Arc<dyn ArtifactStoragePort>,
    history_repo: Arc<dyn HistoryRepositoryPort>,
    player: Arc<dyn AudioPlayerPort>,
    assistant: Option<Arc<dyn PromptAssistantPort>>,
    encoder: Option<Arc<dyn AudioEncoderPort>>,
    config: GenerateMusicHandlerConfig,
    cancel: CancellationToken,
}

impl GenerateMusicHandler {
    pub fn new(
        client: GenerationClient,
        storage: Arc<dyn ArtifactStoragePort>,
        history_repo: Arc<dyn HistoryRepositoryPort>,
        player: Arc<dyn AudioPlayerPort>,
        config: GenerateMusicHandlerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            assembler: StreamAssembler::new(storage.clone()),
            storage,
            history_repo,
            player,
            assistant: None,
            encoder: None,
            config,
            cancel,
        }
    }

    /// 启用 `--optimize` 所需的 prompt 改写
    pub fn with_assistant(mut self, assistant: Arc<dyn PromptAssistantPort>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// 启用 WAV 以外的输出格式
    pub fn with_encoder(mut self, encoder: Arc<dyn AudioEncoderPort>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub async fn handle(
        &self,
        cmd: GenerateMusicCommand,
    ) -> Result<GenerateMusicResponse, ApplicationError> {
        let request = GenerationRequest::new(cmd.prompt, cmd.duration_secs, cmd.bpm)?
            .with_seed(cmd.seed)
            .with_temperature(cmd.temperature)?
            .with_style(cmd.style);

        let (request, source_prompt) = if cmd.optimize {
            self.optimize(request).await
        } else {
            (request, None)
        };

        self.run_request(request, source_prompt, cmd.output, cmd.format, cmd.play)
            .await
    }

    /// 执行一个已构造好的请求（重新生成也走这里）
    pub async fn run_request(
        &self,
        request: GenerationRequest,
        source_prompt: Option<String>,
        output: OutputTarget,
        format: OutputFormat,
        play: bool,
    ) -> Result<GenerateMusicResponse, ApplicationError> {
        request.validate()?;
        self.check_encoder(format).await?;

        let span = tracing::info_span!(
            "generation",
            id = %Uuid::new_v4(),
            duration_secs = request.duration_secs(),
            bpm = request.bpm(),
            format = %format,
        );

        self.generate(request, source_prompt, output, format, play)
            .instrument(span)
            .await
    }

    async fn generate(
        &self,
        request: GenerationRequest,
        source_prompt: Option<String>,
        output: OutputTarget,
        format: OutputFormat,
        play: bool,
    ) -> Result<GenerateMusicResponse, ApplicationError> {
        // 临时文件在本函数返回时删除
        let (destination, _temp_guard) = self
            .resolve_destination(&output, request.prompt(), format)
            .await?;

        tracing::info!(
            prompt = %request.prompt(),
            destination = %destination.display(),
            "Starting generation"
        );

        let (artifact, retries) = match self.produce(&request, &destination, format).await {
            Ok(produced) => produced,
            Err(e) => {
                if output == OutputTarget::Auto {
                    self.release(&destination).await;
                }
                return Err(e);
            }
        };

        let record = if output.is_temporary() {
            None
        } else {
            Some(self.record(request, source_prompt, &artifact).await?)
        };

        let playback_error = if play {
            match self.player.play(&artifact.path).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(error = %e, path = %artifact.path.display(), "Playback failed");
                    Some(e.to_string())
                }
            }
        } else {
            None
        };

        Ok(GenerateMusicResponse {
            artifact,
            record,
            retries,
            playback_error,
        })
    }

    /// 建立会话、拼接落盘，必要时转码到目标格式
    async fn produce(
        &self,
        request: &GenerationRequest,
        destination: &Path,
        format: OutputFormat,
    ) -> Result<(GeneratedArtifact, u32), ApplicationError> {
        let encoder = self.encoder.as_ref().filter(|_| format != OutputFormat::Wav);
        // 需要转码时先拼成 WAV，转码结果再原子落到目标路径
        let wav = match encoder {
            Some(_) => Some(
                tempfile::Builder::new()
                    .prefix("gen-music-")
                    .suffix(".wav")
                    .tempfile()
                    .map_err(|e| ApplicationError::Write(e.to_string()))?
                    .into_temp_path(),
            ),
            None => None,
        };

        let limits = RunLimits::new(self.config.timeout, self.cancel.child_token());

        let mut stream = limits.run(self.client.open_session(request)).await?;
        let retries = stream.retries();

        let assembled_at = wav.as_deref().unwrap_or(destination);
        let mut artifact = self
            .assembler
            .assemble(&mut stream, request.duration_secs(), assembled_at, &limits)
            .await?;

        let (Some(encoder), Some(wav)) = (encoder, &wav) else {
            return Ok((artifact, retries));
        };
        limits
            .run(async {
                encoder
                    .encode(wav, destination, format)
                    .await
                    .map_err(ApplicationError::from)
            })
            .await?;

        tracing::info!(path = %destination.display(), format = %format, "Artifact encoded");
        artifact.path = destination.to_path_buf();
        artifact.format = format;
        Ok((artifact, retries))
    }

    /// WAV 以外的格式需要编码器，且要在生成前确认可用
    async fn check_encoder(&self, format: OutputFormat) -> Result<(), ApplicationError> {
        if format == OutputFormat::Wav {
            return Ok(());
        }
        let encoder = self.encoder.as_ref().ok_or_else(|| {
            ApplicationError::Configuration(format!("no encoder configured for {} output", format))
        })?;
        encoder.ensure_available(format).await?;
        Ok(())
    }

    /// 释放生成失败时占用的自动命名路径
    async fn release(&self, reserved: &Path) {
        if let Err(e) = self.storage.delete(reserved).await {
            tracing::warn!(
                error = %e,
                path = %reserved.display(),
                "Failed to release reserved output path"
            );
        }
    }

    /// 追加历史记录；失败时删除产物，保证没有未记录的产物
    async fn record(
        &self,
        request: GenerationRequest,
        source_prompt: Option<String>,
        artifact: &GeneratedArtifact,
    ) -> Result<HistoryRecord, ApplicationError> {
        let new_record = NewHistoryRecord::from_artifact(request, source_prompt, artifact);

        match self.history_repo.append(new_record).await {
            Ok(record) => {
                tracing::info!(
                    index = record.index,
                    path = %record.output_path.display(),
                    "History recorded"
                );
                Ok(record)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to record history, removing artifact");
                if let Err(delete_err) = self.storage.delete(&artifact.path).await {
                    tracing::error!(
                        error = %delete_err,
                        path = %artifact.path.display(),
                        "Failed to remove unrecorded artifact"
                    );
                }
                Err(e.into())
            }
        }
    }

    async fn resolve_destination(
        &self,
        output: &OutputTarget,
        prompt: &str,
        format: OutputFormat,
    ) -> Result<(PathBuf, Option<TempPath>), ApplicationError> {
        match output {
            OutputTarget::Auto => Ok((self.storage.allocate_path(prompt, format).await?, None)),
            OutputTarget::Path(path) => Ok((path.clone(), None)),
            OutputTarget::Temporary => {
                let temp = tempfile::Builder::new()
                    .prefix("gen-music-")
                    .suffix(&format!(".{}", format.extension()))
                    .tempfile()
                    .map_err(|e| ApplicationError::Write(e.to_string()))?
                    .into_temp_path();
                Ok((temp.to_path_buf(), Some(temp)))
            }
        }
    }

    /// 改写失败时回退到原始 prompt
    async fn optimize(&self, request: GenerationRequest) -> (GenerationRequest, Option<String>) {
        let Some(assistant) = &self.assistant else {
            tracing::warn!("Prompt assistant not configured, using original prompt");
            return (request, None);
        };

        let original = request.prompt().to_string();
        let optimized = match assistant.optimize_prompt(&original).await {
            Ok(optimized) => optimized,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt optimization failed, using original prompt");
                return (request, None);
            }
        };

        if optimized.trim() == original {
            return (request, None);
        }

        match request.clone().with_prompt(optimized) {
            Ok(rewritten) => {
                tracing::info!(
                    original = %original,
                    optimized = %rewritten.prompt(),
                    "Prompt optimized"
                );
                (rewritten, Some(original))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Optimized prompt rejected, using original prompt");
                (request, None)
            }
        }
    }
}

/// RerunGeneration Handler - 按历史记录原样重新生成
pub struct RerunGenerationHandler {
    history_repo: Arc<dyn HistoryRepositoryPort>,
    storage: Arc<dyn ArtifactStoragePort>,
    generate: Arc<GenerateMusicHandler>,
}

impl RerunGenerationHandler {
    pub fn new(
        history_repo: Arc<dyn HistoryRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
        generate: Arc<GenerateMusicHandler>,
    ) -> Self {
        Self {
            history_repo,
            storage,
            generate,
        }
    }

    pub async fn handle(
        &self,
        cmd: RerunGenerationCommand,
    ) -> Result<GenerateMusicResponse, ApplicationError> {
        let record = self
            .history_repo
            .get(cmd.index)
            .await?
            .ok_or_else(|| ApplicationError::not_found("History item", cmd.index))?;

        if !self.storage.exists(record.output_path()).await {
            return Err(ApplicationError::ArtifactMissing {
                index: record.index,
                path: record.output_path.clone(),
            });
        }

        let format = cmd
            .format
            .unwrap_or_else(|| OutputFormat::from_path(record.output_path()));

        tracing::info!(
            index = record.index,
            prompt = %record.request.prompt(),
            format = %format,
            "Rerunning history item"
        );

        self.generate
            .run_request(
                record.request.clone(),
                record.source_prompt.clone(),
                cmd.output,
                format,
                cmd.play,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::EngineError;
    use crate::application::services::GenerationClientConfig;
    use crate::application::testing::{
        CopyingEncoder, FailingHistoryRepository, RecordingPlayer, StubAssistant,
    };
    use crate::infrastructure::adapters::{FakeMusicClient, FileArtifactStorage, ScriptedStep};
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteHistoryRepository,
    };
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        handler: Arc<GenerateMusicHandler>,
        engine: Arc<FakeMusicClient>,
        repo: Arc<dyn HistoryRepositoryPort>,
        storage: Arc<FileArtifactStorage>,
        player: Arc<RecordingPlayer>,
        dir: TempDir,
    }

    struct Options {
        timeout: Duration,
        cancel: CancellationToken,
        repo: Option<Arc<dyn HistoryRepositoryPort>>,
        player: RecordingPlayer,
        assistant: Option<StubAssistant>,
        encoder: Option<Arc<CopyingEncoder>>,
    }

    impl Default for Options {
        fn default() -> Self {
            Self {
                timeout: Duration::from_secs(30),
                cancel: CancellationToken::new(),
                repo: None,
                player: RecordingPlayer::default(),
                assistant: None,
                encoder: None,
            }
        }
    }

    async fn memory_repo() -> Arc<dyn HistoryRepositoryPort> {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(SqliteHistoryRepository::new(pool))
    }

    async fn fixture_with(engine: FakeMusicClient, options: Options) -> Fixture {
        let dir = tempdir().unwrap();
        let engine = Arc::new(engine);
        let storage = Arc::new(FileArtifactStorage::new(dir.path()).await.unwrap());
        let repo = match options.repo {
            Some(repo) => repo,
            None => memory_repo().await,
        };
        let player = Arc::new(options.player);

        let client = GenerationClient::new(
            engine.clone(),
            GenerationClientConfig {
                retry_backoff: Duration::from_millis(1),
                max_retries: 1,
            },
        );
        let mut handler = GenerateMusicHandler::new(
            client,
            storage.clone(),
            repo.clone(),
            player.clone(),
            GenerateMusicHandlerConfig {
                timeout: options.timeout,
            },
            options.cancel,
        );
        if let Some(assistant) = options.assistant {
            handler = handler.with_assistant(Arc::new(assistant));
        }
        if let Some(encoder) = options.encoder {
            handler = handler.with_encoder(encoder);
        }

        Fixture {
            handler: Arc::new(handler),
            engine,
            repo,
            storage,
            player,
            dir,
        }
    }

    async fn fixture(scripts: Vec<Vec<ScriptedStep>>) -> Fixture {
        fixture_with(FakeMusicClient::scripted(scripts), Options::default()).await
    }

    fn command(duration_secs: u32) -> GenerateMusicCommand {
        GenerateMusicCommand {
            prompt: "test tone".to_string(),
            duration_secs,
            bpm: 120,
            seed: None,
            temperature: None,
            style: None,
            output: OutputTarget::Auto,
            format: OutputFormat::Wav,
            play: false,
            optimize: false,
        }
    }

    fn wav_files(dir: &TempDir) -> Vec<PathBuf> {
        std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_full_duration_is_recorded_with_next_index() {
        let f = fixture(vec![
            vec![ScriptedStep::Seconds(1); 5],
            vec![ScriptedStep::Seconds(1); 5],
        ])
        .await;

        let first = f.handler.handle(command(5)).await.unwrap();
        let second = f.handler.handle(command(5)).await.unwrap();

        assert_eq!(second.artifact.actual_duration, Duration::from_secs(5));
        let first_index = first.record.unwrap().index;
        let record = second.record.unwrap();
        assert_eq!(record.index, first_index + 1);
        assert_eq!(record.request.prompt(), "test tone");
        assert_eq!(record.captured_ms, 5000);
        assert!(record.output_path.exists());
        assert_eq!(f.repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_early_end_is_still_recorded() {
        let f = fixture(vec![vec![ScriptedStep::Seconds(1); 2]]).await;

        let response = f.handler.handle(command(5)).await.unwrap();

        assert_eq!(response.artifact.actual_duration, Duration::from_secs(2));
        assert_eq!(response.record.unwrap().captured_ms, 2000);
        assert_eq!(f.repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_on_first_chunk_is_retried_once() {
        let f = fixture(vec![
            vec![ScriptedStep::Fail(EngineError::Connection("reset".into()))],
            vec![ScriptedStep::Seconds(1); 5],
        ])
        .await;

        let response = f.handler.handle(command(5)).await.unwrap();

        assert_eq!(response.retries, 1);
        assert_eq!(f.engine.sessions_opened(), 2);
        assert_eq!(response.artifact.actual_duration, Duration::from_secs(5));
        assert_eq!(f.repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_fails_fast() {
        let f = fixture(vec![vec![ScriptedStep::Seconds(1)]]).await;
        let mut cmd = command(5);
        cmd.prompt = "   ".to_string();

        let err = f.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, ApplicationError::InvalidRequest(_)));
        assert_eq!(f.engine.sessions_opened(), 0);
    }

    #[tokio::test]
    async fn test_empty_stream_records_nothing() {
        let f = fixture(vec![vec![]]).await;

        let err = f.handler.handle(command(5)).await.unwrap_err();

        assert!(matches!(err, ApplicationError::EmptyStream));
        assert_eq!(f.repo.count().await.unwrap(), 0);
        assert!(wav_files(&f.dir).is_empty());
    }

    #[tokio::test]
    async fn test_timeout_discards_output() {
        let f = fixture_with(
            FakeMusicClient::scripted(vec![vec![ScriptedStep::Seconds(1), ScriptedStep::Stall]]),
            Options {
                timeout: Duration::from_millis(200),
                ..Options::default()
            },
        )
        .await;

        let err = f.handler.handle(command(5)).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Timeout(_)));
        assert_eq!(f.engine.sessions_closed(), 1);
        assert_eq!(f.repo.count().await.unwrap(), 0);
        assert!(wav_files(&f.dir).is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_records_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let f = fixture_with(
            FakeMusicClient::scripted(vec![vec![ScriptedStep::Seconds(1); 5]]),
            Options {
                cancel,
                ..Options::default()
            },
        )
        .await;

        let err = f.handler.handle(command(5)).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Cancelled));
        assert_eq!(f.repo.count().await.unwrap(), 0);
        assert!(wav_files(&f.dir).is_empty());
    }

    #[tokio::test]
    async fn test_write_error_records_nothing() {
        let f = fixture(vec![vec![ScriptedStep::Seconds(1); 5]]).await;
        let blocker = f.dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let mut cmd = command(5);
        cmd.output = OutputTarget::Path(blocker.join("out.wav"));

        let err = f.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Write(_)));
        assert_eq!(f.repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_history_failure_removes_artifact() {
        let f = fixture_with(
            FakeMusicClient::scripted(vec![vec![ScriptedStep::Seconds(1); 5]]),
            Options {
                repo: Some(Arc::new(FailingHistoryRepository)),
                ..Options::default()
            },
        )
        .await;

        let err = f.handler.handle(command(5)).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Repository(_)));
        assert!(wav_files(&f.dir).is_empty());
    }

    #[tokio::test]
    async fn test_temporary_output_is_played_and_removed() {
        let f = fixture(vec![vec![ScriptedStep::Seconds(1); 2]]).await;
        let mut cmd = command(2);
        cmd.output = OutputTarget::Temporary;
        cmd.play = true;

        let response = f.handler.handle(cmd).await.unwrap();

        assert!(response.record.is_none());
        assert_eq!(f.player.played(), vec![response.artifact.path.clone()]);
        assert!(!response.artifact.path.exists());
        assert_eq!(f.repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_playback_failure_keeps_record() {
        let f = fixture_with(
            FakeMusicClient::scripted(vec![vec![ScriptedStep::Seconds(1); 2]]),
            Options {
                player: RecordingPlayer::failing(),
                ..Options::default()
            },
        )
        .await;
        let mut cmd = command(2);
        cmd.play = true;

        let response = f.handler.handle(cmd).await.unwrap();

        assert!(response.playback_error.is_some());
        assert!(response.record.is_some());
        assert_eq!(f.repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_optimized_prompt_keeps_source_prompt() {
        let f = fixture_with(
            FakeMusicClient::scripted(vec![vec![ScriptedStep::Seconds(1); 2]]),
            Options {
                assistant: Some(StubAssistant::replying("warm analog synth arpeggios")),
                ..Options::default()
            },
        )
        .await;
        let mut cmd = command(2);
        cmd.optimize = true;

        let record = f.handler.handle(cmd).await.unwrap().record.unwrap();

        assert_eq!(record.request.prompt(), "warm analog synth arpeggios");
        assert_eq!(record.source_prompt.as_deref(), Some("test tone"));
        assert_eq!(record.display_prompt(), "test tone");
    }

    #[tokio::test]
    async fn test_failed_optimization_falls_back() {
        let f = fixture_with(
            FakeMusicClient::scripted(vec![vec![ScriptedStep::Seconds(1); 2]]),
            Options {
                assistant: Some(StubAssistant::failing()),
                ..Options::default()
            },
        )
        .await;
        let mut cmd = command(2);
        cmd.optimize = true;

        let record = f.handler.handle(cmd).await.unwrap().record.unwrap();

        assert_eq!(record.request.prompt(), "test tone");
        assert!(record.source_prompt.is_none());
    }

    fn rerun_handler(f: &Fixture) -> RerunGenerationHandler {
        RerunGenerationHandler::new(f.repo.clone(), f.storage.clone(), f.handler.clone())
    }

    #[tokio::test]
    async fn test_rerun_reproduces_request_fields() {
        let f = fixture(vec![
            vec![ScriptedStep::Seconds(1); 3],
            vec![ScriptedStep::Seconds(1); 3],
        ])
        .await;
        let mut cmd = command(3);
        cmd.bpm = 95;
        cmd.seed = Some(42);
        cmd.temperature = Some(1.3);
        cmd.style = Some("dub techno".to_string());
        let original = f.handler.handle(cmd).await.unwrap().record.unwrap();

        let rerun = rerun_handler(&f)
            .handle(RerunGenerationCommand {
                index: original.index,
                output: OutputTarget::Auto,
                format: None,
                play: false,
            })
            .await
            .unwrap()
            .record
            .unwrap();

        assert_eq!(rerun.request, original.request);
        assert_eq!(rerun.index, original.index + 1);
        assert_ne!(rerun.output_path, original.output_path);
    }

    #[tokio::test]
    async fn test_rerun_unknown_index_is_not_found() {
        let f = fixture(vec![
            vec![ScriptedStep::Seconds(1)],
            vec![ScriptedStep::Seconds(1)],
            vec![ScriptedStep::Seconds(1)],
        ])
        .await;
        for _ in 0..3 {
            f.handler.handle(command(1)).await.unwrap();
        }

        let err = rerun_handler(&f)
            .handle(RerunGenerationCommand {
                index: 99,
                output: OutputTarget::Auto,
                format: None,
                play: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::NotFound { .. }));
        assert_ne!(err.exit_code(), 0);
        assert_eq!(f.repo.count().await.unwrap(), 3);
        assert_eq!(f.engine.sessions_opened(), 3);
    }

    #[tokio::test]
    async fn test_rerun_with_missing_artifact_fails_cleanly() {
        let f = fixture(vec![vec![ScriptedStep::Seconds(1)], vec![ScriptedStep::Seconds(1)]]).await;
        let record = f.handler.handle(command(1)).await.unwrap().record.unwrap();
        std::fs::remove_file(&record.output_path).unwrap();

        let err = rerun_handler(&f)
            .handle(RerunGenerationCommand {
                index: record.index,
                output: OutputTarget::Auto,
                format: None,
                play: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::ArtifactMissing { index: 1, .. }));
        assert_eq!(f.repo.count().await.unwrap(), 1);
        assert_eq!(f.repo.get(1).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_concurrent_generations_of_same_prompt_do_not_collide() {
        let f = fixture(vec![
            vec![ScriptedStep::Seconds(1); 2],
            vec![ScriptedStep::Seconds(1); 2],
        ])
        .await;

        let (a, b) = tokio::join!(f.handler.handle(command(2)), f.handler.handle(command(2)));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.artifact.path, b.artifact.path);
        for artifact in [&a.artifact, &b.artifact] {
            let bytes = std::fs::read(&artifact.path).unwrap();
            assert_eq!(&bytes[0..4], b"RIFF");
            assert_eq!(bytes.len() as u64, 44 + artifact.pcm_bytes);
        }
        assert_eq!(wav_files(&f.dir).len(), 2);
        assert_eq!(f.repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mp3_output_is_encoded_from_assembled_wav() {
        let encoder = Arc::new(CopyingEncoder::default());
        let f = fixture_with(
            FakeMusicClient::scripted(vec![vec![ScriptedStep::Seconds(1); 2]]),
            Options {
                encoder: Some(encoder.clone()),
                ..Options::default()
            },
        )
        .await;
        let mut cmd = command(2);
        cmd.format = OutputFormat::Mp3;

        let response = f.handler.handle(cmd).await.unwrap();

        let path = response.artifact.path.clone();
        assert!(path.to_string_lossy().ends_with(".mp3"));
        assert_eq!(response.artifact.format, OutputFormat::Mp3);
        assert_eq!(encoder.encoded(), vec![(path.clone(), OutputFormat::Mp3)]);
        assert_eq!(response.record.unwrap().output_path, path);
        assert_eq!(wav_files(&f.dir), vec![path]);
    }

    #[tokio::test]
    async fn test_unavailable_encoder_fails_before_generation() {
        let f = fixture_with(
            FakeMusicClient::scripted(vec![vec![ScriptedStep::Seconds(1); 2]]),
            Options {
                encoder: Some(Arc::new(CopyingEncoder::unavailable())),
                ..Options::default()
            },
        )
        .await;
        let mut cmd = command(2);
        cmd.format = OutputFormat::Mp3;

        let err = f.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Configuration(_)));
        assert_eq!(f.engine.sessions_opened(), 0);
        assert!(wav_files(&f.dir).is_empty());
    }

    #[tokio::test]
    async fn test_rerun_keeps_original_format() {
        let encoder = Arc::new(CopyingEncoder::default());
        let f = fixture_with(
            FakeMusicClient::scripted(vec![
                vec![ScriptedStep::Seconds(1)],
                vec![ScriptedStep::Seconds(1)],
            ]),
            Options {
                encoder: Some(encoder.clone()),
                ..Options::default()
            },
        )
        .await;
        let mut cmd = command(1);
        cmd.format = OutputFormat::Mp3;
        let original = f.handler.handle(cmd).await.unwrap().record.unwrap();

        let rerun = rerun_handler(&f)
            .handle(RerunGenerationCommand {
                index: original.index,
                output: OutputTarget::Auto,
                format: None,
                play: false,
            })
            .await
            .unwrap();

        assert_eq!(rerun.artifact.format, OutputFormat::Mp3);
        assert_eq!(encoder.encoded().len(), 2);
    }
}
