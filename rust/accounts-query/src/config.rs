use crate::error::QueryError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_MAX_REQUESTS_PER_BATCH: usize = 100;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(QueryError::UnknownCommitment(other.to_string())),
        }
    }
}

/// An RPC connection handle: an endpoint and the commitment it operates at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConnection {
    endpoint: String,
    commitment: Option<Commitment>,
}

impl RpcConnection {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            commitment: None,
        }
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = Some(commitment);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn commitment(&self) -> Option<Commitment> {
        self.commitment
    }
}

/// Where and at what commitment a fetch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSpec {
    Commitment(Commitment),
    Connection(RpcConnection),
    Explicit {
        commitment: Option<Commitment>,
        endpoint: Option<String>,
    },
}

impl Default for ConnectionSpec {
    fn default() -> Self {
        ConnectionSpec::Commitment(Commitment::default())
    }
}

impl ConnectionSpec {
    /// Resolves to a concrete `(commitment, endpoint)` pair, filling gaps with
    /// `confirmed` and the public mainnet endpoint.
    pub fn resolve(&self) -> (Commitment, String) {
        let (commitment, endpoint) = match self {
            ConnectionSpec::Commitment(c) => (Some(*c), None),
            ConnectionSpec::Connection(conn) => (conn.commitment, Some(conn.endpoint.as_str())),
            ConnectionSpec::Explicit {
                commitment,
                endpoint,
            } => (*commitment, endpoint.as_deref()),
        };
        (
            commitment.unwrap_or_default(),
            endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
        )
    }
}

impl From<Commitment> for ConnectionSpec {
    fn from(c: Commitment) -> Self {
        ConnectionSpec::Commitment(c)
    }
}

impl From<RpcConnection> for ConnectionSpec {
    fn from(conn: RpcConnection) -> Self {
        ConnectionSpec::Connection(conn)
    }
}

impl From<&RpcConnection> for ConnectionSpec {
    fn from(conn: &RpcConnection) -> Self {
        ConnectionSpec::Connection(conn.clone())
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Log full request and response bodies at debug level
    pub debug: bool,
    /// Keep accounts whose data failed to decode, with an empty field map
    pub include_empty_results: bool,
    pub include_metadata: bool,
    pub max_requests_per_batch: usize,
    pub delay_between_batches: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            debug: false,
            include_empty_results: false,
            include_metadata: true,
            max_requests_per_batch: DEFAULT_MAX_REQUESTS_PER_BATCH,
            delay_between_batches: DEFAULT_BATCH_DELAY,
        }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn with_empty_results(mut self, enabled: bool) -> Self {
        self.include_empty_results = enabled;
        self
    }

    pub fn with_metadata(mut self, enabled: bool) -> Self {
        self.include_metadata = enabled;
        self
    }

    pub fn with_batch_size(mut self, max_requests: usize) -> Self {
        self.max_requests_per_batch = max_requests;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.delay_between_batches = delay;
        self
    }
}

/// Defaults used by [`AccountsQuery::fetch`](crate::AccountsQuery::fetch).
///
/// Built once at startup and handed to each root query.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub connection: ConnectionSpec,
    pub options: FetchOptions,
    pub http_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSpec::default(),
            options: FetchOptions::default(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(mut self, connection: impl Into<ConnectionSpec>) -> Self {
        self.connection = connection.into();
        self
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}
