use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "songdown",
    about = "Songdown - Search YouTube, download a song as MP3 and tag it",
    version,
    long_about = "An interactive CLI tool that searches YouTube, lets you pick a result, downloads its audio, converts it to MP3 and embeds title, album, artist and cover art. Run it without arguments to start an interactive session."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Search, download, convert and tag a single song (the default)
    Get {
        /// Search term (asked interactively if not specified)
        #[arg(value_name = "QUERY")]
        query: Option<String>,
    },

    /// Show or locate the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that yt-dlp and ffmpeg are available
    Deps,
}

impl Cli {
    /// Subcommand to run, defaulting to an interactive `get`
    pub fn selected_command(&self) -> Commands {
        match &self.command {
            Some(Commands::Get { query }) => Commands::Get {
                query: query.clone(),
            },
            Some(Commands::Config { show }) => Commands::Config { show: *show },
            Some(Commands::Deps) => Commands::Deps,
            None => Commands::Get { query: None },
        }
    }

    /// Log filter directive for the selected verbosity
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "songdown=debug"
        } else {
            "songdown=info"
        }
    }
}
