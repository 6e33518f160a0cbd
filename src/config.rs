use crate::cli::Cli;
use crate::error::{Result, RootwatchError};
use std::path::PathBuf;

/// Everything a trace run needs, fixed before the tracee starts.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    pub command: Vec<String>,

    /// Directory relative tracee paths are resolved against.
    pub resolution_base: PathBuf,

    /// Accesses are reported only for paths at or below this directory.
    pub root: PathBuf,
}

impl TraceConfig {
    pub fn from_args(args: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::new(args.command.clone(), cwd)
    }

    /// Both the resolution base and the root are `cwd`.
    pub fn new(command: Vec<String>, cwd: PathBuf) -> Result<Self> {
        if command.is_empty() {
            return Err(RootwatchError::InvalidArgument("empty command".to_string()));
        }
        if !cwd.is_absolute() {
            return Err(RootwatchError::InvalidArgument(format!(
                "working directory is not absolute: {}",
                cwd.display()
            )));
        }

        Ok(Self {
            command,
            root: cwd.clone(),
            resolution_base: cwd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_and_base_are_the_cwd() {
        let config = TraceConfig::new(vec!["true".to_string()], PathBuf::from("/srv/app")).unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/app"));
        assert_eq!(config.resolution_base, config.root);
    }

    #[test]
    fn rejects_empty_command() {
        let err = TraceConfig::new(Vec::new(), PathBuf::from("/srv/app")).unwrap_err();
        assert!(matches!(err, RootwatchError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_relative_cwd() {
        let err = TraceConfig::new(vec!["true".to_string()], PathBuf::from("srv")).unwrap_err();
        assert!(matches!(err, RootwatchError::InvalidArgument(_)));
    }
}
