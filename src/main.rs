//! BARQUE - Batch markdown-to-PDF report generation
//!
//! Main entry point for the command-line interface.
//!
//! # Execution Flow
//!
//! 1. Parse the command line
//! 2. Initialize logging → logs/barque.<date> plus console output on stderr
//! 3. Create the tokio runtime (subprocess execution, conversion worker pool)
//! 4. Resolve configuration (overrides > explicit file > environment >
//!    project file > user file > defaults)
//! 5. Dispatch the requested command
//! 6. Shutdown the runtime with a 5s timeout
//!
//! Exit code is 0 on success and non-zero when the requested operation
//! failed. A batch run with some failed documents still exits 0 — the
//! failures are visible in the summary — while orchestrator-level errors
//! (bad input root, invalid configuration) fail the process.

use anyhow::{bail, Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::fs;

use barque::config::{
    ConfigResolver, DeliveryConfig, DeliveryConfigLoader, DeliveryProvider, Environment,
    Overrides, CONFIG_FILE_NAME, PROJECT_CONFIG_DIR,
};
use barque::config::delivery::EMAIL_FILE_NAME;
use barque::services::delivery::default_report_body;
use barque::services::{EmailMessage, Mailer, PopMailer};
use barque::{BarqueConfig, PdfGenerator, ThemeSelection, APP_NAME, VERSION};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = barque::logging::setup_logging_with_console("logs", "barque", cli.debug, true)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("barque-worker")
        .build()?;

    let result = runtime.block_on(run(cli));

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init {
            directory,
            force,
            with_email,
        } => cmd_init(&directory, force, with_email),
        Commands::Generate {
            file,
            theme,
            output,
            config,
        } => cmd_generate(&file, theme, output, config.as_deref()).await,
        Commands::Batch {
            directory,
            theme,
            workers,
            pattern,
            output,
            config,
        } => cmd_batch(&directory, theme, workers, &pattern, output, config.as_deref()).await,
        Commands::Clean { all, output, force } => cmd_clean(all, output, force),
        Commands::Config {
            show,
            validate,
            config,
        } => cmd_config(show, validate, config.as_deref()),
        Commands::Email {
            files,
            to,
            subject,
            from_email,
            body,
            cc,
            bcc,
            provider,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            resend_api_key,
            email_config,
        } => {
            let delivery = resolve_delivery_config(
                email_config.as_deref(),
                provider.as_deref(),
                smtp_host,
                smtp_port,
                smtp_username,
                smtp_password,
                resend_api_key,
            )?;
            cmd_email(files, to, subject, from_email, body, cc, bcc, delivery).await
        }
        Commands::Send {
            file,
            to,
            subject,
            from_email,
            theme,
            output,
            provider,
            body,
        } => cmd_send(&file, to, subject, from_email, theme, output, provider.as_deref(), body)
            .await,
    }
}

/// Resolve the main configuration with CLI overrides applied last.
fn resolve_config(
    explicit: Option<&Utf8Path>,
    output: Option<Utf8PathBuf>,
    workers: Option<usize>,
) -> Result<BarqueConfig> {
    let resolver = ConfigResolver::new()?;
    let env = Environment::from_process();
    let overrides = Overrides {
        output_dir: output,
        workers,
    };
    Ok(resolver.resolve(explicit, &env, &overrides)?)
}

fn resolve_delivery_config(
    explicit: Option<&Utf8Path>,
    provider: Option<&str>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    resend_api_key: Option<String>,
) -> Result<DeliveryConfig> {
    let loader = DeliveryConfigLoader::new()?;
    let env = Environment::from_process();
    let mut delivery = loader.load(explicit, &env)?;

    // CLI flags are the highest-precedence layer.
    if let Some(provider) = provider {
        delivery.provider = if provider == "smtp" {
            DeliveryProvider::Smtp
        } else {
            DeliveryProvider::Resend
        };
    }
    if smtp_host.is_some() {
        delivery.smtp.host = smtp_host;
    }
    if let Some(port) = smtp_port {
        delivery.smtp.port = port;
    }
    if smtp_username.is_some() {
        delivery.smtp.username = smtp_username;
    }
    if smtp_password.is_some() {
        delivery.smtp.password = smtp_password;
    }
    if resend_api_key.is_some() {
        delivery.resend.api_key = resend_api_key;
    }

    Ok(delivery)
}

/// Pick the theme selection: CLI flag, else the configured preference.
fn select_theme(flag: Option<ThemeSelection>, config: &BarqueConfig) -> ThemeSelection {
    flag.unwrap_or_else(|| config.default_theme.parse().unwrap_or_default())
}

fn cmd_init(directory: &Utf8Path, force: bool, with_email: bool) -> Result<()> {
    let config_dir = directory.join(PROJECT_CONFIG_DIR);
    let config_file = config_dir.join(CONFIG_FILE_NAME);

    if config_file.exists() && !force {
        bail!("Configuration already exists at {config_file}; pass --force to overwrite");
    }

    fs::create_dir_all(config_dir.join("themes"))
        .with_context(|| format!("Failed to create config directory: {config_dir}"))?;
    fs::write(&config_file, BarqueConfig::default_yaml())
        .with_context(|| format!("Failed to write config: {config_file}"))?;
    println!("Created configuration: {config_file}");

    if with_email {
        let email_file = config_dir.join(EMAIL_FILE_NAME);
        if email_file.exists() && !force {
            bail!("Email configuration already exists at {email_file}; pass --force to overwrite");
        }
        fs::write(&email_file, DeliveryConfigLoader::example_yaml())
            .with_context(|| format!("Failed to write email config: {email_file}"))?;
        println!("Created email configuration: {email_file}");
    }

    println!("\nBARQUE initialized successfully.");
    println!("\nNext steps:");
    println!("  1. Edit {config_file} to customize settings");
    println!("  2. Run 'barque generate <file.md>' to create PDFs");
    println!("  3. Run 'barque batch <directory>' for bulk processing");
    Ok(())
}

async fn cmd_generate(
    file: &Utf8Path,
    theme: Option<ThemeSelection>,
    output: Option<Utf8PathBuf>,
    config_path: Option<&Utf8Path>,
) -> Result<()> {
    let config = resolve_config(config_path, output, None)?;
    let theme = select_theme(theme, &config);

    println!("Processing: {}", file.file_name().unwrap_or(file.as_str()));

    let generator = PdfGenerator::new(config)?;
    let result = generator.generate(file, theme).await;

    if result.success {
        println!("\nGeneration successful!");
        for pdf in &result.files {
            println!("  {pdf}");
        }
        if let Some(metadata) = &result.metadata {
            println!("\nStatistics:");
            println!("  Words: {}", metadata.word_count);
            println!("  Sections: {}", metadata.section_count);
            if metadata.has_math {
                println!("  Math formulas: yes");
            }
        }
        Ok(())
    } else {
        bail!(
            "Generation failed: {}",
            result.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
}

async fn cmd_batch(
    directory: &Utf8Path,
    theme: Option<ThemeSelection>,
    workers: Option<usize>,
    pattern: &str,
    output: Option<Utf8PathBuf>,
    config_path: Option<&Utf8Path>,
) -> Result<()> {
    let config = resolve_config(config_path, output, workers)?;
    let theme = select_theme(theme, &config);
    let create_index = config.create_index;

    println!("Batch processing: {directory}");
    println!("  Pattern: {pattern}");
    println!("  Theme: {theme}");

    let generator = PdfGenerator::new(config)?;
    let report = generator
        .batch_generate(directory, theme, workers, pattern)
        .await?;

    if report.total == 0 {
        println!("\nNo markdown files found matching '{pattern}'");
        return Ok(());
    }

    println!("\nBatch processing complete");
    println!("  Total files: {}", report.total);
    println!("  Successful: {}", report.succeeded);
    if report.failed > 0 {
        println!("  Errors: {}", report.failed);
        for result in report.results.iter().filter(|r| !r.success) {
            if let Some(error) = &result.error {
                println!("    - {error}");
            }
        }
    }
    if create_index {
        println!(
            "\nIndex: {}",
            generator.output_dir().join(barque::services::index::INDEX_FILE_NAME)
        );
    }
    println!("Output directory: {}", generator.output_dir());

    // Per-document failures are reported above without failing the process;
    // only orchestrator-level errors (already propagated) do that.
    Ok(())
}

fn cmd_clean(all: bool, output: Option<Utf8PathBuf>, force: bool) -> Result<()> {
    let output_dir = output.unwrap_or_else(|| Utf8PathBuf::from("./output"));

    if !output_dir.exists() {
        println!("Output directory does not exist: {output_dir}");
        return Ok(());
    }

    if !force {
        bail!("Refusing to delete generated files in {output_dir} without --force");
    }

    let mut targets = vec!["light", "dark", "metadata"];
    if all {
        targets.extend([".temp", ".cache"]);
    }

    for name in targets {
        let dir = output_dir.join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("Failed to remove {dir}"))?;
            println!("Removed: {name}/");
        }
    }

    let index_file = output_dir.join(barque::services::index::INDEX_FILE_NAME);
    if index_file.exists() {
        fs::remove_file(&index_file).with_context(|| format!("Failed to remove {index_file}"))?;
        println!("Removed: {}", barque::services::index::INDEX_FILE_NAME);
    }

    println!("\nClean complete.");
    Ok(())
}

fn cmd_config(show: bool, validate: bool, config_path: Option<&Utf8Path>) -> Result<()> {
    let resolver = ConfigResolver::new()?;
    let env = Environment::from_process();

    // Resolution already aggregates every problem; a failure here prints the
    // full list and exits non-zero.
    let config = resolver.resolve(config_path, &env, &Overrides::default())?;

    if show {
        println!("Current configuration");
        match config_path {
            Some(path) => println!("Config file: {path}"),
            None => match resolver.find_project_config() {
                Some(path) => println!("Project config: {path}"),
                None => println!("Config file: <using defaults>"),
            },
        }
        println!();
        println!("{}", config.to_yaml()?);
    }

    if validate {
        println!("Configuration is valid.");
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_email(
    files: Vec<Utf8PathBuf>,
    to: Vec<String>,
    subject: String,
    from_email: Option<String>,
    body: Option<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    delivery: DeliveryConfig,
) -> Result<()> {
    if !PopMailer::is_available() {
        bail!(
            "Charm Pop is not installed; {}",
            PopMailer::INSTALLATION_INSTRUCTIONS
        );
    }

    for file in &files {
        if !file.exists() {
            bail!("File not found: {file}");
        }
    }

    println!("Preparing email...");
    println!("  To: {}", to.join(", "));
    println!("  Subject: {subject}");
    println!("  Attachments: {}", files.len());

    let body = body.unwrap_or_else(|| default_report_body(&files));
    let message = EmailMessage {
        to,
        subject,
        body,
        attachments: files,
        from_email,
        cc,
        bcc,
    };

    let mailer = PopMailer::new(delivery);
    let receipt = mailer.send(&message).await?;

    println!("\nEmail sent successfully!");
    println!("  Sent to: {}", receipt.recipients.join(", "));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_send(
    file: &Utf8Path,
    to: Vec<String>,
    subject: Option<String>,
    from_email: Option<String>,
    theme: Option<ThemeSelection>,
    output: Option<Utf8PathBuf>,
    provider: Option<&str>,
    body: Option<String>,
) -> Result<()> {
    if !PopMailer::is_available() {
        bail!(
            "Charm Pop is not installed; {}",
            PopMailer::INSTALLATION_INSTRUCTIONS
        );
    }

    let config = resolve_config(None, output, None)?;
    let theme = select_theme(theme, &config);

    println!("Processing: {}", file.file_name().unwrap_or(file.as_str()));

    let generator = PdfGenerator::new(config)?;
    let result = generator.generate(file, theme).await;

    if !result.success {
        bail!(
            "PDF generation failed: {}",
            result.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    println!("PDF generation successful!");
    for pdf in &result.files {
        println!("  {pdf}");
    }

    let subject = subject.unwrap_or_else(|| {
        let title = result
            .metadata
            .as_ref()
            .map(|m| m.title.clone())
            .unwrap_or_else(|| file.file_name().unwrap_or(file.as_str()).to_string());
        format!("PDF Report: {title}")
    });

    let delivery =
        resolve_delivery_config(None, provider, None, None, None, None, None)?;

    println!("\nSending email to {}...", to.join(", "));
    cmd_email(
        result.files,
        to,
        subject,
        from_email,
        body,
        Vec::new(),
        Vec::new(),
        delivery,
    )
    .await
}
