//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::{Path, PathBuf};
use std::sync::Arc;

use autotest::config::{self, Config, LoggingFmtStyle};
use autotest::context::Context;
use autotest::error::Error;
use autotest::logdir::LogDir;
use autotest::orchestrator::{Orchestrator, RunOptions};
use autotest_catalog::Platform;
use autotest_utils::error::with_source;
use autotest_utils::host::{AnsibleHostFactory, HostRegistry};
use autotest_utils::shell::{LocalShell, Shell};
use clap::{App, Arg};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

fn init_tracing(config: &config::Logging, log_dir: &Path, level: LevelFilter) {
    // Enable logging to a file inside the log directory of the run.
    let file = config.file.enabled.then(|| {
        let file_appender = rolling::never(log_dir, &config.file.name);
        let log_level_filter = LevelFilter::from_level(tracing::Level::DEBUG);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(false)
            .with_file(config.file.fmt.show_source)
            .with_line_number(config.file.fmt.show_source)
            .with_ansi(config.file.fmt.colors);
        let layer = match config.file.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    // Enable logging to stdout.
    let stdout = config.stdout.enabled.then(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(config.stdout.fmt.show_source)
            .with_line_number(config.stdout.fmt.show_source)
            .with_ansi(config.stdout.fmt.colors);
        let layer = match config.stdout.fmt.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(level)
    });

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file)
        .with(stdout)
        .init();
}

fn logging_level(level: Option<&str>) -> LevelFilter {
    match level {
        Some("debug") => LevelFilter::DEBUG,
        Some("warn") => LevelFilter::WARN,
        Some("crit") => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

async fn run(ctx: &Context, opts: &RunOptions) -> Result<bool, Error> {
    let mut orchestrator = Orchestrator::load(ctx, opts).await?;
    let summary = orchestrator.run(opts).await?;
    summary.log();
    Ok(!summary.any_failed())
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("Network switch test orchestrator")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::with_name("topo2cases-file")
                .short("i")
                .long("topo2cases-file")
                .value_name("file")
                .help("Topologies and testcases to run."),
        )
        .arg(
            Arg::with_name("sonic-image")
                .short("s")
                .long("sonic-image")
                .value_name("url")
                .help("Image to install on the DUT before testing."),
        )
        .arg(
            Arg::with_name("testbed-config")
                .short("c")
                .long("testbed-config")
                .value_name("file")
                .help("Testbed processing file, e.g. testbed-topo1.yaml."),
        )
        .arg(
            Arg::with_name("testbed-file")
                .short("t")
                .long("testbed-file")
                .value_name("file")
                .default_value("testbed.csv")
                .help("Testbed file."),
        )
        .arg(
            Arg::with_name("logging-level")
                .short("l")
                .long("logging-level")
                .value_name("level")
                .possible_values(&["debug", "info", "warn", "crit"])
                .help("Logging level of the standard output (default: info)."),
        )
        .arg(
            Arg::with_name("build-number")
                .short("b")
                .long("build-number")
                .value_name("number")
                .help("Build number, used as the log directory name."),
        )
        .arg(
            Arg::with_name("dry")
                .long("dry")
                .help("Log commands without running them."),
        )
        .arg(
            Arg::with_name("platform")
                .short("p")
                .long("platform")
                .value_name("platform")
                .possible_values(&["vskvm", "dut"])
                .required(true)
                .help("Platform to test."),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .get_matches();

    // Read configuration file.
    let config = match Config::load(matches.value_of("config")) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}", with_source(&error));
            std::process::exit(1);
        }
    };

    // Create the log directory of this run.
    let logdir =
        LogDir::new(Path::new(&config.log_root), matches.value_of("build-number"));
    if let Err(error) = logdir.create() {
        eprintln!("{}", with_source(&error));
        std::process::exit(1);
    }

    // Initialize tracing.
    let level = logging_level(matches.value_of("logging-level"));
    init_tracing(&config.logging, logdir.root(), level);

    let platform = match matches.value_of("platform").map(str::parse::<Platform>) {
        Some(Ok(platform)) => platform,
        Some(Err(error)) => {
            error!(%error, "invalid platform");
            std::process::exit(1);
        }
        None => {
            error!("missing platform");
            std::process::exit(1);
        }
    };
    let opts = RunOptions {
        platform,
        testbed_file: PathBuf::from(matches.value_of("testbed-file").unwrap_or("testbed.csv")),
        selection_file: matches.value_of("topo2cases-file").map(PathBuf::from),
        image_url: matches.value_of("sonic-image").map(str::to_owned),
        testbed_config: matches.value_of("testbed-config").map(PathBuf::from),
    };

    let dry_run = matches.is_present("dry");
    let shell: Arc<dyn Shell> = Arc::new(LocalShell::new(dry_run));
    let factory =
        AnsibleHostFactory::new(config.ansible.vm_inventory.clone(), shell.clone());
    let hosts = HostRegistry::new(factory);
    let ctx = Context::new(config, shell, hosts, logdir);

    info!(log_dir = %ctx.logdir.root().display(), %platform, %dry_run, "starting up");

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(run(&ctx, &opts));

    match result {
        Ok(true) => info!("all tests passed"),
        Ok(false) => {
            error!("some tests failed");
            std::process::exit(1);
        }
        Err(error) => {
            error.log();
            std::process::exit(1);
        }
    }
}
