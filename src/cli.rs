use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rootwatch")]
#[command(
    about = "Run a command under ptrace and report the files it opens and directories it enters inside the current directory"
)]
#[command(version)]
pub struct Cli {
    /// Command to trace, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Also write events as JSONL to FILE
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Disable colored terminal output
    #[arg(long)]
    pub no_color: bool,

    /// Do not print events to the terminal
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.is_empty() {
            anyhow::bail!("Command is required");
        }

        if let Some(output) = &self.output {
            if output.is_dir() {
                anyhow::bail!("Output path is a directory: {}", output.display());
            }
        }

        Ok(())
    }

    /// Default env_logger filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
