//! 命令行参数定义

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::generation::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "gen-music")]
#[command(about = "Generate music from text prompts with Lyria RealTime")]
#[command(version)]
pub struct Cli {
    /// Config file (replaces ./gen-music.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a clip and record it in history
    Generate(GenerateArgs),

    /// Inspect or replay past generations
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Write a configuration template to ~/.config/gen-music/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    /// Text prompt (read from stdin when omitted and stdin is piped)
    pub prompt: Option<String>,

    /// Duration in seconds
    #[arg(short, long)]
    pub duration: Option<u32>,

    /// Beats per minute
    #[arg(long)]
    pub bpm: Option<u32>,

    /// Seed for reproducible output
    #[arg(long)]
    pub seed: Option<u32>,

    /// Sampling temperature (0.0 - 3.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Additional style prompt, mixed in at half weight
    #[arg(long)]
    pub style: Option<String>,

    /// Output file (default: <output_dir>/<slug>_<timestamp>.<format>)
    #[arg(short, long, value_name = "PATH", conflicts_with = "temp")]
    pub output: Option<PathBuf>,

    /// Output format: wav or mp3 (mp3 needs ffmpeg; default: generation.format)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Play the result when done
    #[arg(short, long)]
    pub play: bool,

    /// Re-run history item INDEX with its stored parameters
    #[arg(long, value_name = "INDEX")]
    pub rerun: Option<u64>,

    /// Rewrite the prompt with Gemini before generating
    #[arg(long, conflicts_with = "rerun")]
    pub optimize: bool,

    /// Generate to a temporary file, play it, keep nothing
    #[arg(long)]
    pub temp: bool,

    /// Detach and generate in a background process
    #[arg(short, long)]
    pub background: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum HistoryAction {
    /// List all generations, oldest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one history item
    Show {
        index: u64,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Play the stored file of a history item
    Play { index: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "gen-music", "generate", "lofi beats", "-d", "30", "--bpm", "85", "--seed", "7",
            "-p", "-v",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.prompt.as_deref(), Some("lofi beats"));
        assert_eq!(args.duration, Some(30));
        assert_eq!(args.bpm, Some(85));
        assert_eq!(args.seed, Some(7));
        assert!(args.play);
        assert!(!args.temp);
    }

    #[test]
    fn test_parse_format_and_background() {
        let cli = Cli::try_parse_from(["gen-music", "generate", "x", "-f", "MP3", "-b"]).unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.format, Some(OutputFormat::Mp3));
        assert!(args.background);

        let result = Cli::try_parse_from(["gen-music", "generate", "x", "--format", "flac"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_temp_conflicts_with_output() {
        let result = Cli::try_parse_from(["gen-music", "generate", "x", "--temp", "-o", "a.wav"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_history_defaults_to_list() {
        let cli = Cli::try_parse_from(["gen-music", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { action: None }));

        let cli = Cli::try_parse_from(["gen-music", "history", "play", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::History {
                action: Some(HistoryAction::Play { index: 3 })
            }
        ));
    }
}
