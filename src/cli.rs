//! Client command line

use clap::error::ErrorKind;
use clap::Parser;

/// Printed when the client is started with the wrong arguments
pub const USAGE: &str = "Usage: chat_client <connectionString> <nickname>";

/// Connect to a chat relay and chat from the terminal.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Server address as host:port
    pub connection_string: String,

    /// Name to log in with
    pub nickname: String,
}

/// Outcome of argument parsing that does not yield arguments
#[derive(Debug)]
pub enum ArgsError {
    /// Wrong argument count or shape; report usage and exit with status 1
    Usage,
    /// `--help` or `--version`; let clap print it
    Display(clap::Error),
}

impl ClientArgs {
    /// Parse arguments, mapping every parse failure to [`ArgsError::Usage`]
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(args) => Ok(args),
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Err(ArgsError::Display(e)),
                _ => Err(ArgsError::Usage),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_positionals() {
        let args = ClientArgs::try_parse_args(["chat_client", "localhost:50000", "alice"]).unwrap();
        assert_eq!(args.connection_string, "localhost:50000");
        assert_eq!(args.nickname, "alice");
    }

    #[test]
    fn test_missing_argument_is_usage_error() {
        let err = ClientArgs::try_parse_args(["chat_client", "localhost:50000"]).unwrap_err();
        assert!(matches!(err, ArgsError::Usage));
    }

    #[test]
    fn test_extra_argument_is_usage_error() {
        let err = ClientArgs::try_parse_args(["chat_client", "a:1", "alice", "extra"]).unwrap_err();
        assert!(matches!(err, ArgsError::Usage));
    }

    #[test]
    fn test_help_is_displayed() {
        let err = ClientArgs::try_parse_args(["chat_client", "--help"]).unwrap_err();
        assert!(matches!(err, ArgsError::Display(_)));
    }
}
