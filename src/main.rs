use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yt_transcript::output::{self, Reporter};
use yt_transcript::transcribe::PipelineOptions;
use yt_transcript::utils;
use yt_transcript::{Cli, Config, TranscriptError, TranscriptionPipeline};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "yt_transcript=debug"
    } else {
        "yt_transcript=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let reporter = Reporter::new(cli.verbose);
    match run(cli, reporter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<TranscriptError>() {
            Some(err) => {
                reporter.error("Error:", err.message());
                ExitCode::from(err.exit_code())
            }
            None => {
                reporter.error("Unexpected error:", &format!("{:#}", e));
                ExitCode::from(1)
            }
        },
    }
}

async fn run(cli: Cli, reporter: Reporter) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).map_err(|e| {
        TranscriptError::invalid_input(format!("Invalid configuration: {:#}", e))
    })?;

    let options = PipelineOptions {
        language: cli.language.clone(),
        model: cli.model.clone(),
        device: cli.device,
        force_stt: cli.force_stt,
        keep_temp: cli.keep_temp,
        temp_root: None,
    };
    let pipeline = TranscriptionPipeline::from_config(&config, options, reporter);
    let video_id = pipeline.resolve(&cli.url)?;

    if reporter.is_verbose() {
        let missing = utils::check_dependencies(&config).await;
        for dep in missing {
            reporter.warn(&format!("Missing tool: {}", dep));
        }
    }

    output::ensure_out_dir(&cli.out_dir)?;
    let result = pipeline.transcribe(&video_id).await?;

    let path = output::save_to_file(&result, &cli.out_dir, cli.format, cli.timestamps)?;
    reporter.success(
        "Transcript written:",
        &format!(
            "{} (source={}, segments={}, duration={})",
            path.display(),
            result.source(),
            result.segments().len(),
            utils::format_duration(result.covered_duration())
        ),
    );

    Ok(())
}
