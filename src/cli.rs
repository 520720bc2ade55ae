use clap::{ArgAction, CommandFactory, Parser};
use std::{ffi::OsString, path::PathBuf};

use crate::cmd::{Command, Intent};
use crate::connect::ConnectConfig;
use crate::error::{KvError, Result};

/// Server used when `-s` is not given.
pub const DEFAULT_SERVER: &str = "nats://127.0.0.1:4222";

/// Identity label sent to the server on connect.
pub const CLIENT_NAME: &str = "mybucket";

// Long flags that are also accepted with a single dash, as in `-creds FILE`.
const SINGLE_DASH_LONG: &[&str] = &["creds", "nkey", "tlscert", "tlskey", "tlscacert", "history"];

#[derive(Parser, Debug)]
#[command(name = "mybucket")]
#[command(version, about = "Get or put a single key in a NATS key-value bucket")]
pub struct Cli {
    /// The nats server URLs (separated by comma)
    #[arg(short = 's', long = "server", default_value = DEFAULT_SERVER, value_name = "URLS")]
    pub servers: String,

    /// User credentials file
    #[arg(long, value_name = "FILE")]
    pub creds: Option<String>,

    /// NKey seed file
    #[arg(long, value_name = "FILE")]
    pub nkey: Option<String>,

    /// TLS client certificate file
    #[arg(long, value_name = "FILE")]
    pub tlscert: Option<String>,

    /// Private key file for client certificate
    #[arg(long, value_name = "FILE")]
    pub tlskey: Option<String>,

    /// CA certificate to verify peer against
    #[arg(long, value_name = "FILE")]
    pub tlscacert: Option<String>,

    /// Show key history
    #[arg(long)]
    pub history: bool,

    /// Enable verbose logging (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// <bucket> <key> to read, or <bucket> <key> <value> to write
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,
}

impl Cli {
    /// Parses `args` after rewriting single-dash long flags to their `--` form.
    pub fn try_parse_args<I, T>(args: I) -> std::result::Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Cli::try_parse_from(normalize_args(args))
    }

    /// Resolves the positional arguments into an operation intent.
    pub fn intent(&self) -> Result<Intent> {
        let (bucket, key, command) = match self.args.as_slice() {
            [bucket, key] => (bucket, key, Command::Get),
            [bucket, key, value] => (bucket, key, Command::Put { value: value.clone() }),
            other => {
                return Err(KvError::Usage(format!(
                    "expected <bucket> <key> [<value>], got {} argument(s)",
                    other.len()
                )))
            }
        };

        if bucket.is_empty() || key.is_empty() {
            return Err(KvError::Usage("bucket and key must not be empty".into()));
        }

        Ok(Intent {
            bucket: bucket.clone(),
            key: key.clone(),
            command,
            history: self.history,
        })
    }

    pub fn connect_config(&self) -> ConnectConfig {
        ConnectConfig {
            servers: self.servers.clone(),
            name: CLIENT_NAME.to_string(),
            creds: given(&self.creds),
            nkey: given(&self.nkey),
            tls_cert: given(&self.tlscert),
            tls_key: given(&self.tlskey),
            tls_ca: given(&self.tlscacert),
        }
    }
}

/// Rewrites `-creds`, `-history` and the other single-dash long flags (also in
/// `-name=value` form) to `--creds`, `--history`, ... Arguments after `--` are
/// left alone.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut positional_only = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg: OsString| {
            if positional_only {
                return arg;
            }
            if arg == "--" {
                positional_only = true;
                return arg;
            }
            let long = arg.to_str().and_then(long_form);
            long.map(OsString::from).unwrap_or(arg)
        })
        .collect()
}

fn long_form(arg: &str) -> Option<String> {
    let rest = arg.strip_prefix('-').filter(|rest| !rest.starts_with('-'))?;
    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
    SINGLE_DASH_LONG
        .contains(&name)
        .then(|| format!("-{}", arg))
}

// An empty path on the command line means "not set".
fn given(path: &Option<String>) -> Option<PathBuf> {
    path.as_deref().filter(|p| !p.is_empty()).map(PathBuf::from)
}

pub fn usage() -> String {
    Cli::command().render_help().to_string()
}
