use clap::Parser;
use pavia::archive::{colliding_outputs, discover};
use pavia::{convert_file, is_converted, output_path, Alignment, Config, Pipeline};
use rayon::prelude::*;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug, Default)]
#[clap(author, about, long_about = None)]
struct Args {
    /// Score archives (.mscz), or directories holding them
    #[clap(required = true)]
    input: Vec<PathBuf>,

    /// YAML file redefining the conversion styles
    #[clap(short = 'c', long, value_parser)]
    config: Option<PathBuf>,

    /// Only produce the named style; may be repeated
    #[clap(short = 's', long = "style", value_parser)]
    styles: Vec<String>,

    /// Do not add the conversion banner to the score
    #[clap(long, value_parser)]
    no_banner: bool,

    /// Fail when staves have differing measure counts
    #[clap(long, value_parser)]
    strict: bool,

    /// Write converted files here instead of next to their source
    #[clap(short = 'o', long, value_parser)]
    output_dir: Option<PathBuf>,
}

struct Job {
    src: PathBuf,
    dst: PathBuf,
    pipeline: Pipeline,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("error reading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => Config::default(),
    };
    if args.no_banner {
        config.banner = false;
    }
    if args.strict {
        config.alignment = Alignment::Strict;
    }

    for name in &args.styles {
        if config.style(name).is_none() {
            log::error!("unknown style '{}'", name);
            process::exit(1);
        }
    }
    let styles: Vec<_> = config
        .styles
        .iter()
        .filter(|style| args.styles.is_empty() || args.styles.contains(&style.name))
        .collect();

    let inputs = match discover(&args.input) {
        Ok(inputs) => inputs,
        Err(e) => {
            log::error!("error listing inputs: {}", e);
            process::exit(1);
        }
    };

    let mut jobs = Vec::new();
    for src in inputs {
        if is_converted(&src, &config.marker) {
            log::info!("skipping already converted {}", src.display());
            continue;
        }
        for style in &styles {
            jobs.push(Job {
                dst: output_path(&src, &style.tag, &config.marker, args.output_dir.as_deref()),
                src: src.clone(),
                pipeline: config.pipeline(style),
            });
        }
    }

    let collisions = colliding_outputs(jobs.iter().map(|job| job.dst.as_path()));
    if !collisions.is_empty() {
        for dst in &collisions {
            log::error!("more than one input would be written to {}", dst.display());
        }
        process::exit(1);
    }

    let failures = jobs
        .par_iter()
        .filter(|job| {
            log::info!("{} → {}", job.src.display(), job.dst.display());
            match convert_file(&job.src, &job.dst, &job.pipeline) {
                Ok(()) => false,
                Err(e) => {
                    log::error!(
                        "error converting '{}' ({}): {}",
                        job.src.display(),
                        job.pipeline.name(),
                        e
                    );
                    true
                }
            }
        })
        .count();

    if failures > 0 {
        log::error!("{} of {} conversions failed", failures, jobs.len());
        process::exit(1);
    }
}
