use anyhow::Context;
use clap::CommandFactory;
use std::process::ExitCode;
use thumbnail::cli::{parse_invocation, Args, Invocation};
use thumbnail::{batch_thumbnail, logger, CancelFlag, Engine, OutputFormat};
use thumbnail::{error, info, warn};

fn main() -> ExitCode {
    let args = match parse_invocation(std::env::args_os()) {
        Ok(Invocation::Run(args)) => args,
        Ok(Invocation::Help) => {
            let _ = Args::command().print_help();
            println!();
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Version) => {
            print!("{}", Args::command().render_version());
            return ExitCode::SUCCESS;
        }
        Err(e) => e.exit(),
    };

    logger::set_verbosity(args.verbosity());

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<u8> {
    let options = args.options();
    let cancel = CancelFlag::new();
    let engine = Engine::new(&args.vips)
        .with_timeout(args.timeout())
        .with_cancel_flag(cancel.clone());

    engine.probe()?;

    ctrlc::set_handler(move || cancel.cancel())
        .context("failed to install the interrupt handler")?;

    if let Some(ext) = &options.ext {
        if ext.parse::<OutputFormat>().is_err() {
            warn!(
                "Output extension {} is not supported; only .jpg, .jpeg and .png can be written",
                ext
            );
        }
    }

    info!("🚀 Source: {}", args.source.display());
    info!("📁 Output: {}", args.output.display());

    let summary = batch_thumbnail(&args.source, &args.output, &options, &engine, args.jobs())
        .map_err(|e| {
            let context = if e.is_fatal() {
                format!("Cannot process {}", args.source.display())
            } else {
                "Batch aborted before any image was processed".to_string()
            };
            anyhow::Error::new(e).context(context)
        })?;
    match summary {
        Some(summary) => {
            summary.print();
            Ok(summary.exit_code())
        }
        None => {
            warn!("No images found in {}", args.source.display());
            Ok(0)
        }
    }
}
