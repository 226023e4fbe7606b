use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use barque::services::DEFAULT_PATTERN;
use barque::ThemeSelection;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "BARQUE - Beautiful Automated Report and Query Universal Engine",
    long_about = "Multi-modal document orchestration with dual-theme PDF generation and email delivery.\n\n\
        Examples:\n  \
        barque init                                  # Initialize BARQUE\n  \
        barque generate document.md                  # Generate PDF (both themes)\n  \
        barque generate doc.md --theme light         # Generate light theme only\n  \
        barque batch docs/ --workers 8               # Process directory with 8 workers\n  \
        barque send doc.md --to user@example.com     # Generate PDF and email it\n  \
        barque email file.pdf --to user@example.com --subject Report"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize BARQUE configuration in a directory
    Init {
        /// Directory to initialize
        #[arg(long, default_value = ".")]
        directory: Utf8PathBuf,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,

        /// Also write an example email.yaml
        #[arg(long)]
        with_email: bool,
    },

    /// Generate PDF from a markdown file
    Generate {
        /// Markdown file to convert
        file: Utf8PathBuf,

        /// Theme selection: light, dark, or both (default from config)
        #[arg(long)]
        theme: Option<ThemeSelection>,

        /// Output directory
        #[arg(long)]
        output: Option<Utf8PathBuf>,

        /// Custom config file path
        #[arg(long)]
        config: Option<Utf8PathBuf>,
    },

    /// Process all markdown files in a directory
    Batch {
        /// Directory containing markdown files
        directory: Utf8PathBuf,

        /// Theme selection: light, dark, or both (default from config)
        #[arg(long)]
        theme: Option<ThemeSelection>,

        /// Number of parallel workers (default from config)
        #[arg(long)]
        workers: Option<usize>,

        /// File pattern to match
        #[arg(long, default_value = DEFAULT_PATTERN)]
        pattern: String,

        /// Output directory
        #[arg(long)]
        output: Option<Utf8PathBuf>,

        /// Custom config file path
        #[arg(long)]
        config: Option<Utf8PathBuf>,
    },

    /// Remove generated output files
    Clean {
        /// Also remove cache directories
        #[arg(long)]
        all: bool,

        /// Output directory to clean (default: ./output)
        #[arg(long)]
        output: Option<Utf8PathBuf>,

        /// Delete without confirmation
        #[arg(long)]
        force: bool,
    },

    /// Show or validate the resolved configuration
    Config {
        /// Show the current configuration
        #[arg(long)]
        show: bool,

        /// Validate the configuration
        #[arg(long)]
        validate: bool,

        /// Custom config file path
        #[arg(long)]
        config: Option<Utf8PathBuf>,
    },

    /// Send files via email using Charm Pop
    Email {
        /// Files to attach
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,

        /// Recipient email address (can be given multiple times)
        #[arg(long, required = true)]
        to: Vec<String>,

        /// Email subject line
        #[arg(long)]
        subject: String,

        /// Sender email address
        #[arg(long = "from")]
        from_email: Option<String>,

        /// Email body text (markdown supported)
        #[arg(long)]
        body: Option<String>,

        /// CC email address (can be given multiple times)
        #[arg(long)]
        cc: Vec<String>,

        /// BCC email address (can be given multiple times)
        #[arg(long)]
        bcc: Vec<String>,

        /// Email provider
        #[arg(long, value_parser = ["resend", "smtp"])]
        provider: Option<String>,

        /// SMTP server hostname
        #[arg(long)]
        smtp_host: Option<String>,

        /// SMTP server port
        #[arg(long)]
        smtp_port: Option<u16>,

        /// SMTP username
        #[arg(long)]
        smtp_username: Option<String>,

        /// SMTP password
        #[arg(long)]
        smtp_password: Option<String>,

        /// Resend API key (or set RESEND_API_KEY)
        #[arg(long)]
        resend_api_key: Option<String>,

        /// Custom email config file path
        #[arg(long)]
        email_config: Option<Utf8PathBuf>,
    },

    /// Generate PDF and send it via email (convenience command)
    Send {
        /// Markdown file to convert and send
        file: Utf8PathBuf,

        /// Recipient email address (can be given multiple times)
        #[arg(long, required = true)]
        to: Vec<String>,

        /// Email subject (default: derived from the document title)
        #[arg(long)]
        subject: Option<String>,

        /// Sender email address
        #[arg(long = "from")]
        from_email: Option<String>,

        /// Theme selection: light, dark, or both (default from config)
        #[arg(long)]
        theme: Option<ThemeSelection>,

        /// Output directory
        #[arg(long)]
        output: Option<Utf8PathBuf>,

        /// Email provider
        #[arg(long, value_parser = ["resend", "smtp"])]
        provider: Option<String>,

        /// Custom email body text
        #[arg(long)]
        body: Option<String>,
    },
}
