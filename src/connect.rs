//! Connection setup: option assembly, the NATS session and bucket lookup.

use async_nats::jetstream::{self, context::KeyValueErrorKind};
use async_nats::{Client, ConnectOptions, Event, ServerAddr};
use nkeys::KeyPair;
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};

use crate::bucket::NatsBucket;
use crate::error::{KvError, Result};

/// Everything needed to open a session, as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectConfig {
    pub servers: String, // comma-separated urls
    pub name: String,
    pub creds: Option<PathBuf>,
    pub nkey: Option<PathBuf>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub tls_ca: Option<PathBuf>,
}

/// A single connect option, applied in the order [`ConnectConfig::settings`]
/// returns them.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectSetting {
    Identity(String),
    Credentials(PathBuf),
    ClientCert { cert: PathBuf, key: PathBuf },
    RootCa(PathBuf),
    Nkey(String),
}

impl fmt::Debug for ConnectSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectSetting::Identity(name) => f.debug_tuple("Identity").field(name).finish(),
            ConnectSetting::Credentials(path) => f.debug_tuple("Credentials").field(path).finish(),
            ConnectSetting::ClientCert { cert, key } => f
                .debug_struct("ClientCert")
                .field("cert", cert)
                .field("key", key)
                .finish(),
            ConnectSetting::RootCa(path) => f.debug_tuple("RootCa").field(path).finish(),
            ConnectSetting::Nkey(_) => f.debug_tuple("Nkey").field(&"<seed>").finish(),
        }
    }
}

impl ConnectSetting {
    async fn apply(self, options: ConnectOptions) -> Result<ConnectOptions> {
        let options = match self {
            ConnectSetting::Identity(name) => options.name(name),
            ConnectSetting::Credentials(path) => options
                .credentials_file(path.clone())
                .await
                .map_err(|source| KvError::Credentials { path, source })?,
            ConnectSetting::ClientCert { cert, key } => {
                options.add_client_certificate(cert, key).require_tls(true)
            }
            ConnectSetting::RootCa(path) => options.add_root_certificates(path).require_tls(true),
            ConnectSetting::Nkey(seed) => options.nkey(seed),
        };
        Ok(options)
    }
}

impl ConnectConfig {
    /// Builds the ordered option list. Fails before touching the network when
    /// both a credentials file and an nkey seed are given, or when the seed
    /// file is unreadable or invalid.
    pub fn settings(&self) -> Result<Vec<ConnectSetting>> {
        if self.creds.is_some() && self.nkey.is_some() {
            return Err(KvError::ConflictingAuth);
        }

        let mut settings = vec![ConnectSetting::Identity(self.name.clone())];

        if let Some(path) = &self.creds {
            settings.push(ConnectSetting::Credentials(path.clone()));
        }

        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => settings.push(ConnectSetting::ClientCert {
                cert: cert.clone(),
                key: key.clone(),
            }),
            (None, None) => {}
            _ => warn!("--tlscert and --tlskey must be given together, ignoring client certificate"),
        }

        if let Some(path) = &self.tls_ca {
            settings.push(ConnectSetting::RootCa(path.clone()));
        }

        if let Some(path) = &self.nkey {
            settings.push(ConnectSetting::Nkey(read_seed(path)?));
        }

        Ok(settings)
    }

    pub fn server_addrs(&self) -> Result<Vec<ServerAddr>> {
        let addrs = self
            .servers
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| {
                url.parse::<ServerAddr>()
                    .map_err(|source| KvError::InvalidServer {
                        url: url.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        if addrs.is_empty() {
            return Err(KvError::InvalidServer {
                url: self.servers.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "no server urls"),
            });
        }
        Ok(addrs)
    }
}

/// Reads a user seed from an nkey seed file.
///
/// The file may hold the bare seed or the decorated form written by `nsc`;
/// the first line starting with `S` is taken as the seed.
pub fn read_seed(path: &Path) -> Result<String> {
    let seed_error = |reason: String| KvError::NkeySeed {
        path: path.to_path_buf(),
        reason,
    };

    let contents = fs::read_to_string(path).map_err(|e| seed_error(e.to_string()))?;
    let seed = contents
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('S'))
        .ok_or_else(|| seed_error("no nkey seed found".into()))?;

    let pair = KeyPair::from_seed(seed).map_err(|e| seed_error(e.to_string()))?;
    if !pair.public_key().starts_with('U') {
        return Err(seed_error("not a valid nkey user seed".into()));
    }
    Ok(seed.to_string())
}

/// The most recent error the server or client reported outside of a request,
/// shared between the connection's event callback and the [`Session`].
#[derive(Debug, Clone, Default)]
pub struct LastError(Arc<Mutex<Option<String>>>);

impl LastError {
    /// Keeps server and client errors; other events are only logged.
    pub fn observe(&self, event: Event) {
        match event {
            Event::ServerError(err) => self.record(err.to_string()),
            Event::ClientError(err) => self.record(err.to_string()),
            other => debug!("connection event: {}", other),
        }
    }

    fn record(&self, err: impl Into<String>) {
        let err = err.into();
        debug!("transport error: {}", err);
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
    }

    pub fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn check(&self) -> Result<()> {
        match self.get() {
            Some(err) => Err(KvError::Transport(err)),
            None => Ok(()),
        }
    }
}

/// An open connection plus the last error reported out of band.
pub struct Session {
    client: Client,
    last_error: LastError,
}

impl Session {
    pub async fn connect(config: &ConnectConfig) -> Result<Session> {
        let settings = config.settings()?;
        let servers = config.server_addrs()?;

        let last_error = LastError::default();
        let observer = last_error.clone();
        let mut options = ConnectOptions::new().event_callback(move |event| {
            let observer = observer.clone();
            async move { observer.observe(event) }
        });

        for setting in settings {
            debug!(?setting, "connect option");
            options = setting.apply(options).await?;
        }

        debug!(servers = %config.servers, "connecting");
        let client = options
            .connect(servers)
            .await
            .map_err(|e| KvError::Connect(e.into()))?;

        Ok(Session { client, last_error })
    }

    /// Resolves `bucket` in the JetStream context of this connection.
    pub async fn open_bucket(&self, bucket: &str) -> Result<NatsBucket> {
        let context = jetstream::new(self.client.clone());
        let store = context.get_key_value(bucket).await.map_err(|e| match e.kind() {
            KeyValueErrorKind::JetStream => KvError::JetStream(e.into()),
            _ => KvError::Bucket {
                bucket: bucket.to_string(),
                source: e.into(),
            },
        })?;
        Ok(NatsBucket::new(store))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Flushes pending writes, then fails if an error was recorded out of band.
    pub async fn finish(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .map_err(|e| KvError::Flush(e.into()))?;
        // A -ERR read before the flush PONG is already queued for the event
        // task, which is woken ahead of us on the current-thread runtime.
        tokio::task::yield_now().await;

        self.last_error.check()
    }

    pub async fn close(self) {
        if let Err(err) = self.client.drain().await {
            debug!("drain: {}", err);
        }
    }
}
