use crate::compile::{compile_filters, rpc_payload, CompiledQuery, Selection};
use crate::config::{Commitment, ConnectionSpec, FetchOptions, QueryConfig};
use crate::error::QueryError;
use crate::filter::Where;
use crate::record::{default_request_id, reconstruct, Record};
use crate::rpc::{execute, HttpTransport, Transport};
use accounts_query_schema::{compute_layout, Schema};
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
struct QueryArgs {
    selection: Selection,
    conditions: Where,
    metadata: Map<String, Value>,
    request_id: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct QueryNode {
    program_address: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    args: QueryArgs,
}

impl QueryNode {
    pub fn program_address(&self) -> Option<&str> {
        self.program_address.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn selection(&self) -> &Selection {
        &self.args.selection
    }
}

/// Root of a query tree over one record type of a schema.
///
/// Each [`at`](Self::at) call adds a leaf bound to a program address; the
/// root compiles every leaf into one `getProgramAccounts` request and
/// returns the decoded records of all of them.
///
/// ```rust,ignore
/// let mut query = AccountsQuery::new(schema, "AccountMetaData");
/// query
///     .at("dammHkt7jmytvbS3nHTxQNEcP59aE57nxwV21YdqEDN")
///     .select(["isWritable"])
///     .where_(Where::new().eq("isSigner", 1u8));
///
/// let records = query.fetch().await?;
/// ```
pub struct AccountsQuery {
    schema: Arc<Schema>,
    record: String,
    config: QueryConfig,
    nodes: Vec<QueryNode>,
    transport: OnceLock<HttpTransport>,
}

impl AccountsQuery {
    pub fn new(schema: Arc<Schema>, record: impl Into<String>) -> Self {
        Self {
            schema,
            record: record.into(),
            config: QueryConfig::default(),
            nodes: vec![QueryNode {
                program_address: None,
                parent: None,
                children: Vec::new(),
                args: QueryArgs::default(),
            }],
            transport: OnceLock::new(),
        }
    }

    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self.transport = OnceLock::new();
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Adds a leaf bound to `program_address` and returns it for chaining.
    pub fn at(&mut self, program_address: impl ToString) -> Leaf<'_> {
        let id = NodeId(self.nodes.len());
        self.nodes.push(QueryNode {
            program_address: Some(program_address.to_string()),
            parent: Some(NodeId::ROOT),
            children: Vec::new(),
            args: QueryArgs::default(),
        });
        self.nodes[NodeId::ROOT.0].children.push(id);
        Leaf { query: self, id }
    }

    /// Reopens an existing leaf.
    pub fn leaf(&mut self, id: NodeId) -> Option<Leaf<'_>> {
        if id == NodeId::ROOT || id.0 >= self.nodes.len() {
            return None;
        }
        Some(Leaf { query: self, id })
    }

    pub fn node(&self, id: NodeId) -> Option<&QueryNode> {
        self.nodes.get(id.0)
    }

    pub fn leaves(&self) -> &[NodeId] {
        &self.nodes[NodeId::ROOT.0].children
    }

    /// Compiles every leaf, in the order they were added.
    pub fn compile(&self, commitment: Commitment) -> Result<Vec<CompiledQuery>, QueryError> {
        if self.leaves().is_empty() {
            return Ok(Vec::new());
        }

        let layout = compute_layout(&self.record, &self.schema).map_err(|e| {
            tracing::warn!("Cannot lay out {}: {}", self.record, e);
            e
        })?;
        let discriminator = self.schema.discriminator(&self.record);

        self.leaves()
            .iter()
            .map(|&id| {
                let node = &self.nodes[id.0];
                let program_address = node
                    .program_address
                    .as_deref()
                    .filter(|address| !address.is_empty())
                    .ok_or_else(|| {
                        QueryError::Configuration("missing program address - use `at()`".to_string())
                    })?;

                let compiled = compile_filters(
                    &node.args.conditions,
                    &node.args.selection,
                    &layout,
                    discriminator,
                )?;
                let payload = rpc_payload(program_address, commitment, &compiled);

                Ok(CompiledQuery {
                    node: id,
                    record: self.record.clone(),
                    program_address: program_address.to_string(),
                    selection: node.args.selection.clone(),
                    compiled,
                    metadata: node.args.metadata.clone(),
                    request_id: node.args.request_id.clone().unwrap_or_else(default_request_id),
                    payload,
                })
            })
            .collect()
    }

    /// HTTP client for [`fetch`](Self::fetch), built on first use.
    fn http_transport(&self) -> Result<&HttpTransport, QueryError> {
        if let Some(transport) = self.transport.get() {
            return Ok(transport);
        }
        let transport = HttpTransport::new(self.config.http_timeout)?;
        Ok(self.transport.get_or_init(|| transport))
    }

    /// Fetches with the connection and options of this query's [`QueryConfig`].
    pub async fn fetch(&self) -> Result<Vec<Record>, QueryError> {
        let transport = self.http_transport()?;
        self.fetch_with(self.config.connection.clone(), &self.config.options, transport)
            .await
    }

    /// Compiles every leaf, sends the requests in batches and returns the
    /// decoded records of all leaves in leaf order.
    pub async fn fetch_with(
        &self,
        connection: impl Into<ConnectionSpec>,
        options: &FetchOptions,
        transport: &dyn Transport,
    ) -> Result<Vec<Record>, QueryError> {
        let (commitment, endpoint) = connection.into().resolve();
        let compiled = self.compile(commitment)?;
        if compiled.is_empty() {
            return Ok(Vec::new());
        }

        let payloads: Vec<Value> = compiled.iter().map(|q| q.payload.clone()).collect();
        let responses = execute(&payloads, &endpoint, options, transport).await;

        let mut records = Vec::new();
        let mut returned = 0usize;
        for (query, accounts) in compiled.iter().zip(responses) {
            returned += accounts.len();
            records.extend(
                accounts
                    .iter()
                    .filter_map(|raw| reconstruct(&self.schema, query, raw, options)),
            );
        }

        tracing::info!(
            "Fetched {} {} records from {} accounts across {} queries",
            records.len(),
            self.record,
            returned,
            compiled.len()
        );

        Ok(records)
    }
}

/// A leaf of an [`AccountsQuery`], borrowed for configuration.
pub struct Leaf<'a> {
    query: &'a mut AccountsQuery,
    id: NodeId,
}

impl<'a> Leaf<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn args(&mut self) -> &mut QueryArgs {
        &mut self.query.nodes[self.id.0].args
    }

    /// Returns only the named fields. An empty list fetches the whole
    /// account but keeps no fields.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args().selection = Selection::Fields(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Fetches no account data, only which accounts match.
    pub fn select_none(mut self) -> Self {
        self.args().selection = Selection::Nothing;
        self
    }

    pub fn where_(mut self, conditions: Where) -> Self {
        self.args().conditions = conditions;
        self
    }

    /// Merges the entries of a JSON object into every record's metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        match metadata {
            Value::Object(entries) => self.args().metadata.extend(entries),
            other => tracing::warn!("Ignoring non-object metadata: {}", other),
        }
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<Value>) -> Self {
        self.args().request_id = Some(request_id.into());
        self
    }
}
