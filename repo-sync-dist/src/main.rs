//! CLI binary interface for repo-sync-dist

use std::io::Write;
use std::panic;
use std::sync::{Arc, Mutex};

use axoasset::LocalAsset;
use clap::Parser;
use cli::{BuildArgs, Cli, Commands, OutputFormat, PublishArgs};
use console::Term;
use jiff::Timestamp;
use lazy_static::lazy_static;
use miette::{Diagnostic, IntoDiagnostic};
use repo_sync_dist::build::{ExecutablePackager, FakePackager, PyInstaller};
use repo_sync_dist::config::TriggerContext;
use repo_sync_dist::host::{GithubCliHost, ReleaseHost};
use repo_sync_dist::platform::select_targets;
use repo_sync_dist::storage::{ArtifactStore, LocalArtifactStore};
use repo_sync_dist::*;
use repo_sync_dist_schema::DistManifest;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

mod cli;

type ReportErrorFunc = dyn Fn(&miette::Report) + Send + Sync + 'static;

lazy_static! {
    static ref REPORT_ERROR: Mutex<Option<Box<ReportErrorFunc>>> = Mutex::new(None);
}

fn set_report_errors_as_json() {
    if let Ok(mut guard) = REPORT_ERROR.lock() {
        *guard = Some(Box::new(move |error| {
            // Manually invoke JSONReportHandler to format the error as a report
            // to out_.
            let mut report = String::new();
            if miette::JSONReportHandler::new()
                .render_report(&mut report, error.as_ref())
                .is_err()
            {
                report = serde_json::to_string(&error.to_string()).unwrap_or_default();
            }
            let _ = writeln!(&mut Term::stdout(), r#"{{"error": {report}}}"#);
        }));
    }
}

fn report_error(error: &miette::Report) {
    if let Ok(guard) = REPORT_ERROR.lock() {
        if let Some(do_report) = &*guard {
            do_report(error);
            return;
        }
    }
    error!("{:?}", error);
}

fn main() {
    let cli = Cli::parse();
    // Init the logger
    tracing_subscriber::fmt::fmt()
        .with_max_level(cli.verbose)
        .with_target(false)
        .without_time()
        .with_ansi(console::colors_enabled_stderr())
        .with_writer(std::io::stderr)
        .init();

    // Control how errors are formatted by setting the miette hook. This will
    // only be used for errors presented to humans, when formatting an error as
    // JSON, it will be handled by a custom `report_error` override, bypassing
    // the hook.
    let _ = miette::set_hook(Box::new(move |_| {
        let graphical_theme = if console::colors_enabled_stderr() {
            miette::GraphicalTheme::unicode()
        } else {
            miette::GraphicalTheme::unicode_nocolor()
        };
        Box::new(
            miette::MietteHandlerOpts::new()
                .graphical_theme(graphical_theme)
                .build(),
        )
    }));

    // Now that miette is set up, use it to format panics.
    panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            msg
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            &msg[..]
        } else {
            "something went wrong"
        };

        #[derive(Debug, Error, Diagnostic)]
        #[error("{message}")]
        pub struct PanicError {
            pub message: String,
            #[help]
            pub help: Option<String>,
        }

        report_error(
            &miette::Report::from(PanicError {
                message: message.to_owned(),
                help: panic_info
                    .location()
                    .map(|loc| format!("at {}:{}:{}", loc.file(), loc.line(), loc.column())),
            })
            .wrap_err("repo-sync-dist panicked"),
        );
    }));

    // If we're outputting JSON, replace the error report method such that it
    // writes errors out to the normal output stream as JSON.
    if cli.output_format == OutputFormat::Json {
        set_report_errors_as_json();
    }

    let main_result = real_main(&cli);

    let _ = main_result.map_err(|e| {
        report_error(&e);
        std::process::exit(-1);
    });
}

fn real_main(cli: &Cli) -> Result<(), miette::Report> {
    match &cli.command {
        Commands::Build(args) => cmd_build(cli, args),
        Commands::Publish(args) => cmd_publish(cli, args),
        Commands::Run(args) => cmd_run(cli, args),
        Commands::Plan => cmd_plan(cli),
        Commands::ResolveVersion => cmd_resolve_version(cli),
        Commands::Prune => cmd_prune(cli),
        Commands::ManifestSchema => cmd_manifest_schema(cli),
    }
}

fn config_from_cli(cli: &Cli) -> Result<Config, miette::Report> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => LocalAsset::current_dir()?,
    };
    let mut config = Config::load(&root)?;
    config.targets = select_targets(&cli.target)?;
    config.trigger = TriggerContext::from_env(
        cli.event.map(Into::into),
        cli.git_ref.clone(),
        cli.sha.clone(),
    );
    Ok(config)
}

fn packager_for(config: &Config, args: &BuildArgs) -> Arc<dyn ExecutablePackager> {
    if args.fake {
        Arc::new(FakePackager)
    } else {
        Arc::new(PyInstaller::from_config(config))
    }
}

fn store_for(config: &Config) -> Arc<LocalArtifactStore> {
    Arc::new(LocalArtifactStore::new(
        config.storage_dir.clone(),
        config.retention_days,
    ))
}

fn runtime() -> Result<tokio::runtime::Runtime, miette::Report> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

fn cmd_build(cli: &Cli, args: &BuildArgs) -> Result<(), miette::Report> {
    let config = config_from_cli(cli)?;
    let packager = packager_for(&config, args);
    let store: Arc<dyn ArtifactStore> = store_for(&config);
    let report = runtime()?.block_on(do_build(&config, packager, store, Timestamp::now()))?;
    print_report(cli, &report)
}

fn cmd_publish(cli: &Cli, args: &PublishArgs) -> Result<(), miette::Report> {
    let mut config = config_from_cli(cli)?;
    if args.repo.is_some() {
        config.repo.clone_from(&args.repo);
    }
    let store = store_for(&config);
    let host = GithubCliHost::from_env(&config)?;
    let report = do_publish(&config, store.as_ref(), &host, Timestamp::now())?;
    print_report(cli, &report)
}

fn cmd_run(cli: &Cli, args: &BuildArgs) -> Result<(), miette::Report> {
    let config = config_from_cli(cli)?;
    let packager = packager_for(&config, args);
    let store: Arc<dyn ArtifactStore> = store_for(&config);

    // Only a run that will publish gets the credential
    let host = if gather_work(&config).release.publish {
        Some(GithubCliHost::from_env(&config)?)
    } else {
        None
    };
    let host_ref = host.as_ref().map(|h| h as &dyn ReleaseHost);
    let report =
        runtime()?.block_on(do_run(&config, packager, store, host_ref, Timestamp::now()))?;
    print_report(cli, &report)
}

fn cmd_plan(cli: &Cli) -> Result<(), miette::Report> {
    let config = config_from_cli(cli)?;
    let (dist, manifest) = do_plan(&config)?;
    let mut out = Term::stdout();
    match cli.output_format {
        OutputFormat::Human => print_plan_human(&mut out, &dist, &manifest).into_diagnostic()?,
        OutputFormat::Json => print_json(&mut out, &dist)?,
    }
    Ok(())
}

fn cmd_resolve_version(cli: &Cli) -> Result<(), miette::Report> {
    let config = config_from_cli(cli)?;
    let resolved = do_resolve_version(&config, Timestamp::now())?;
    let mut out = Term::stdout();
    match cli.output_format {
        OutputFormat::Human => {
            writeln!(out, "version: {}", resolved.version).into_diagnostic()?;
            writeln!(out, "date: {}", resolved.date).into_diagnostic()?;
            writeln!(out, "publish: {}", resolved.publish).into_diagnostic()?;
            writeln!(out, "reap: {}", resolved.reap).into_diagnostic()?;
        }
        OutputFormat::Json => print_json(&mut out, &resolved)?,
    }
    Ok(())
}

fn cmd_prune(cli: &Cli) -> Result<(), miette::Report> {
    let config = config_from_cli(cli)?;
    let store = store_for(&config);
    let pruned = do_prune(store.as_ref(), Timestamp::now())?;
    let mut out = Term::stdout();
    match cli.output_format {
        OutputFormat::Human => {
            if pruned.is_empty() {
                writeln!(out, "nothing to prune").into_diagnostic()?;
            }
            for record in &pruned {
                writeln!(out, "pruned {} (expired {})", record.file_name, record.expires_at)
                    .into_diagnostic()?;
            }
        }
        OutputFormat::Json => print_json(&mut out, &pruned)?,
    }
    Ok(())
}

fn cmd_manifest_schema(_cli: &Cli) -> Result<(), miette::Report> {
    let schema = DistManifest::json_schema();
    print_json(&mut Term::stdout(), &schema)
}

fn print_report(cli: &Cli, report: &PipelineReport) -> Result<(), miette::Report> {
    let mut out = Term::stdout();
    match cli.output_format {
        OutputFormat::Human => print_report_human(&mut out, report).into_diagnostic(),
        OutputFormat::Json => print_json(&mut out, report),
    }
}

fn print_report_human(out: &mut Term, report: &PipelineReport) -> Result<(), std::io::Error> {
    let states = report
        .states
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>();
    writeln!(out, "{}", states.join(" → "))?;
    writeln!(out, "version: {}", report.version)?;
    for artifact in report.manifest.artifacts.values() {
        match (&artifact.path, &artifact.checksum) {
            (Some(path), Some(checksum)) => {
                writeln!(out, "  {path} (sha256 {checksum})")?;
            }
            _ => writeln!(out, "  {}", artifact.file_name)?,
        }
    }
    if let Some(release) = &report.manifest.release {
        writeln!(out, "published release {} ({})", release.tag, release.title)?;
    }
    Ok(())
}

fn print_plan_human(
    out: &mut Term,
    dist: &DistGraph,
    manifest: &DistManifest,
) -> Result<(), std::io::Error> {
    writeln!(out, "legs:")?;
    for leg in &dist.legs {
        writeln!(out, "  {} ({})", leg.target.asset_name, leg.target.os_id)?;
        for step in &leg.steps {
            writeln!(out, "    {step:?}")?;
        }
    }
    let release = &dist.release;
    writeln!(out, "version: {}", release.version)?;
    writeln!(
        out,
        "release: {}",
        match (release.publish, release.reap) {
            (false, _) => "skipped",
            (true, true) => "reap, then publish",
            (true, false) => "publish",
        }
    )?;
    writeln!(
        out,
        "archives: {}",
        manifest.artifact_file_names().collect::<Vec<_>>().join(", ")
    )?;
    Ok(())
}

fn print_json(out: &mut Term, value: &impl Serialize) -> Result<(), miette::Report> {
    let string = serde_json::to_string_pretty(value).into_diagnostic()?;
    writeln!(out, "{string}").into_diagnostic()?;
    Ok(())
}
