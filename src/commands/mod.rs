pub mod dependencies;
pub mod downloads;
pub mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tubegrab_core::fs_paths::{AppPaths, DesktopPaths};

use crate::core::dependencies::TranscoderLocator;
use crate::core::engine::EngineConfig;
use crate::models::media::OutputKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum KindArg {
    /// Video with audio merged into mp4
    Video,
    /// Audio kept in an m4a container
    M4a,
    /// Audio converted to mp3
    Mp3,
}

impl From<KindArg> for OutputKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Video => OutputKind::Video,
            KindArg::M4a => OutputKind::AudioContainer,
            KindArg::Mp3 => OutputKind::UniversalAudio,
        }
    }
}

#[derive(Parser)]
#[command(name = "tubegrab")]
#[command(about = "Inspect and download media from a URL")]
#[command(version)]
pub struct Cli {
    /// yt-dlp executable (defaults to the one on PATH)
    #[arg(long, global = true, env = "TUBEGRAB_YTDLP")]
    ytdlp: Option<PathBuf>,

    /// ffmpeg executable, tried before the bundled and system copies
    #[arg(long, global = true, env = "TUBEGRAB_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show title and available qualities
    Info { url: String },

    /// Download a URL
    Get {
        url: String,
        #[arg(short, long, value_enum, default_value = "video")]
        kind: KindArg,
        /// Quality label as shown by `info` (defaults to the best one)
        #[arg(short, long)]
        quality: Option<String>,
        /// Destination folder (defaults to the saved download folder)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also save the thumbnail next to the file
        #[arg(long)]
        thumbnail: bool,
    },

    /// Remember a download folder
    SetDir { path: PathBuf },

    /// Print the saved download folder
    ShowDir,

    /// Report yt-dlp and ffmpeg availability
    Deps,
}

pub struct AppContext {
    pub paths: Box<dyn AppPaths>,
    pub config: EngineConfig,
}

impl Cli {
    async fn context(&self) -> AppContext {
        let paths: Box<dyn AppPaths> = Box::new(DesktopPaths);

        let ytdlp = match &self.ytdlp {
            Some(p) => p.clone(),
            None => crate::core::ytdlp::find_ytdlp(paths.as_ref())
                .await
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
        };

        let mut locator = TranscoderLocator::new(paths.bundled_bin_dir().as_deref());
        if let Some(ffmpeg) = &self.ffmpeg {
            locator = locator.prefer(ffmpeg.clone());
        }

        AppContext {
            paths,
            config: EngineConfig::new(ytdlp, locator),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let ctx = self.context().await;
        tracing::debug!("using yt-dlp at {}", ctx.config.ytdlp.display());

        match self.command {
            Commands::Info { url } => downloads::info(&ctx, &url).await,
            Commands::Get {
                url,
                kind,
                quality,
                output,
                thumbnail,
            } => {
                let opts = downloads::GetOptions {
                    kind: kind.into(),
                    quality,
                    output,
                    thumbnail,
                };
                downloads::get(&ctx, &url, opts).await
            }
            Commands::SetDir { path } => settings::set_download_dir(&ctx, &path),
            Commands::ShowDir => settings::show_download_dir(&ctx),
            Commands::Deps => dependencies::report(&ctx).await,
        }
    }
}
