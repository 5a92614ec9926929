//! framepipe - run one capture → transform → output pipeline.
//!
//! Configuration comes from `FRAMEPIPE_CONFIG` and `FRAMEPIPE_*` variables,
//! then the flags below. The process exits with the run's status code:
//! 0 completed, 1 setup error, 2 failed, 3 truncated source, 130 cancelled.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use framepipe::config::{ConfigOverrides, PipelineConfig};
use framepipe::pipeline::{self, TransformErrorPolicy, EXIT_OK, EXIT_SETUP};
use framepipe::sink::{self, DigestSink, DigestSummary, SinkConfig, VideoSink};
use framepipe::uri::Location;
use framepipe::{CancelToken, StreamInfo, TransformerRegistry};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "framepipe",
    about = "Stream video frames through capture, transform and output stages"
)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(long, env = "FRAMEPIPE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Input: stub://name?frames=N or a local video file
    #[arg(long, value_name = "URI")]
    input: Option<String>,

    /// Output: stub://name, a .rgb/.raw file, or an encoded video file
    #[arg(long, value_name = "URI")]
    output: Option<String>,

    /// Transformer name (see --list-transforms)
    #[arg(long, value_name = "NAME")]
    transform: Option<String>,

    /// What to do when a frame cannot be transformed (skip|pass-through|abort)
    #[arg(long, value_name = "POLICY")]
    on_transform_error: Option<TransformErrorPolicy>,

    /// Encoder for encoded file outputs
    #[arg(long, value_name = "NAME")]
    codec: Option<String>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,

    /// Print the registered transformers and exit
    #[arg(long)]
    list_transforms: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let code = match run(args) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{:#}", err);
            eprintln!("framepipe: {:#}", err);
            EXIT_SETUP
        }
    };
    std::process::exit(code);
}

fn run(args: Args) -> Result<i32> {
    let registry = TransformerRegistry::with_builtins();
    if args.list_transforms {
        for name in registry.list() {
            let marker = if registry.default_name() == Some(name.as_str()) {
                " (default)"
            } else {
                ""
            };
            println!("{}{}", name, marker);
        }
        return Ok(EXIT_OK);
    }

    let config = load_config(&args)?;
    log::info!(
        "framepipe: {} -> {} via {} (on transform error: {})",
        config.input,
        config.output,
        config.transform,
        config.on_transform_error
    );

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            log::warn!("interrupt received, cancelling");
            cancel.cancel();
        })?;
    }

    let ui = ui::Ui::new(args.ui, std::io::stderr().is_terminal());
    let mut digest: Option<Arc<Mutex<DigestSummary>>> = None;
    let activity = ui.activity("Run pipeline");
    let result = pipeline::run_config_with(&config, &registry, cancel, |sink_config, info| {
        open_output(sink_config, info, &mut digest)
    });
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            activity.finish(false, &err.to_string());
            return Err(err.into());
        }
    };
    activity.finish(report.is_success(), &report.worst().to_string());

    println!("{}", report.summary());
    if let Some(summary) = digest {
        if let Ok(summary) = summary.lock() {
            println!(
                "digest: frames={} chain={}",
                summary.frames,
                summary.chain_hex()
            );
        }
    }
    Ok(report.exit_code())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let overrides = ConfigOverrides {
        input: args.input.clone(),
        output: args.output.clone(),
        codec: args.codec.clone(),
        transform: args.transform.clone(),
        on_transform_error: args.on_transform_error,
    };
    PipelineConfig::load_with(args.config.as_deref(), &overrides)
}

/// Open the configured sink, keeping a handle on the digest summary for
/// `stub://` outputs so it can be printed after the run.
fn open_output(
    sink_config: &SinkConfig,
    info: &StreamInfo,
    digest: &mut Option<Arc<Mutex<DigestSummary>>>,
) -> Result<Box<dyn VideoSink>> {
    if let Location::Stub(stub) = Location::parse(&sink_config.uri)? {
        let sink = DigestSink::new(&stub.name, info);
        *digest = Some(sink.summary_handle());
        return Ok(Box::new(sink));
    }
    sink::open_sink(sink_config, info)
}
