use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Set proxy
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set request headers
    #[arg(required = false, long, short = 'H', global = true)]
    pub header: Option<Vec<String>>,

    /// Set user agent
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether a newer database is published
    Check {
        /// Manifest URL, overriding the configured one
        #[arg(required = false, short, long)]
        url: Option<String>,
    },

    /// Download and install the published database
    #[clap(name = "update", visible_alias = "u")]
    Update {
        /// Manifest URL, overriding the configured one
        #[arg(required = false, short, long)]
        url: Option<String>,

        /// Reinstall even if the installed version is current
        #[arg(required = false, short, long)]
        force: bool,
    },

    /// Show metadata for a title
    #[command(arg_required_else_help = true)]
    Info {
        /// Title id in hex, e.g. 0100000000010000
        title_id: String,
    },

    /// Export the icon of a title
    #[command(arg_required_else_help = true)]
    Icon {
        /// Title id in hex
        title_id: String,

        /// Output file; defaults to `<title_id>.<ext>` in the current directory
        #[arg(required = false, short, long, value_hint = ValueHint::FilePath)]
        output: Option<String>,
    },

    /// Show the installed version and what is loaded
    Status,

    /// Build packs from a title document and an icon directory
    #[command(arg_required_else_help = true)]
    Build {
        /// Title JSON document
        #[arg(required = true, short, long, value_hint = ValueHint::FilePath)]
        titles: String,

        /// Directory of `<title_id>.<ext>` icon files
        #[arg(required = false, short, long, value_hint = ValueHint::DirPath)]
        icons: Option<String>,

        /// Output directory for titles.pack and icons.pack
        #[arg(required = true, short, long, value_hint = ValueHint::DirPath)]
        out: String,
    },

    /// Print the effective configuration
    Config,
}
