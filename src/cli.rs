use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "skipnext",
    version,
    about = "Skip intros and jump to the next episode on video pages.",
    long_about = None
)]
pub struct Cli {
    /// Use a specific configuration file
    #[clap(short = 'c', long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Enable debug output
    #[clap(long, global = true)]
    pub debug: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a page, report its videos and where the controls would go
    Inspect {
        /// Page path or URL
        #[clap(name = "PAGE")]
        page: String,

        /// Print the report as JSON
        #[clap(long)]
        json: bool,
    },

    /// List next-episode candidates for a page, best first
    Next {
        #[clap(name = "PAGE")]
        page: String,
    },

    /// Show or change the persisted overlay settings
    Settings {
        #[clap(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Open pages in an interactive session with the overlay attached
    Watch {
        #[clap(name = "PAGE", required = true)]
        pages: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the effective settings
    Show,

    /// Change one or more fields; the rest keep their values
    Set {
        #[clap(long, value_name = "SECONDS")]
        skip_time: Option<u32>,

        /// auto or manual
        #[clap(long, value_name = "MODE")]
        next_behavior: Option<String>,

        #[clap(long, value_name = "BOOL")]
        skip_button: Option<bool>,

        #[clap(long, value_name = "BOOL")]
        next_button: Option<bool>,
    },

    /// Store the defaults
    Reset,

    /// Answer one JSON request the way a page would send it
    Relay {
        #[clap(name = "REQUEST")]
        request: String,
    },
}
