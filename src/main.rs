use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use ecare_e2e::runner::events::{ConsoleEventListener, EventEmitter};
use ecare_e2e::{report, run_suites, RunConfig, Suite};

#[derive(Parser)]
#[command(name = "ecare-e2e")]
#[command(version = "0.1.0")]
#[command(about = "End-to-end workflow tests for the eCareHealth platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API and/or UI booking workflow
    Run {
        /// Which workflow to run
        #[arg(short, long, value_enum, default_value = "api")]
        suite: Suite,

        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for reports and screenshots
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run API and UI suites concurrently (with --suite all)
        #[arg(long, default_value = "false")]
        parallel: bool,

        /// Run the browser without a window
        #[arg(long, default_value = "false")]
        headless: bool,
    },

    /// Re-render a saved JSON report
    Report {
        /// Path to the structured JSON report
        results: PathBuf,

        /// Output format (html, json, junit)
        #[arg(short, long, default_value = "html")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            suite,
            config,
            output,
            parallel,
            headless,
        } => {
            let mut run_config = RunConfig::load(config.as_deref())?;
            if let Some(dir) = output {
                run_config.output_dir = dir;
            }
            if headless {
                run_config.headless = true;
            }

            println!("{} Running {} suite", "▶".green().bold(), suite.name().cyan());
            if !run_config.base_url.is_empty() {
                println!("  API: {}", run_config.base_url.cyan());
            }
            if !run_config.app_url.is_empty() {
                println!("  Portal: {}", run_config.app_url.cyan());
            }
            println!("  Tenant: {}", run_config.tenant.cyan());
            if parallel {
                println!("  Parallel: {}", "Enabled".yellow());
            }
            println!(
                "  Output: {}",
                run_config.output_dir.display().to_string().cyan()
            );

            let (emitter, receiver) = EventEmitter::new();
            let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

            let result = run_suites(suite, run_config, emitter, parallel).await;
            // Listener ends once every emitter clone is dropped
            listener.await.ok();
            let runs = result?;

            let mut all_passed = true;
            for run in &runs {
                let summary = &run.report.structured.summary;
                println!(
                    "\n{} [{}] {}/{} passed, {} skipped, success rate {}",
                    if run.is_success() { "✓".green() } else { "✗".red() },
                    run.suite.name().cyan(),
                    summary.passed_tests,
                    summary.total_tests,
                    summary.skipped_tests,
                    summary.success_rate
                );
                println!("  Report: {}", run.files.html.display());
                all_passed &= run.is_success();
            }

            if !all_passed {
                std::process::exit(1);
            }
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref()).await?;
        }
    }

    Ok(())
}
