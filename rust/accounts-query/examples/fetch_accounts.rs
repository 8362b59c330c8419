use accounts_query::prelude::*;
use accounts_query::telemetry::{self, TelemetryConfig};
use std::time::Duration;

/// SPL Token program: token accounts are 165 bytes.
const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

fn token_account_schema() -> Schema {
    Schema::new().with_struct(
        "TokenAccount",
        [
            ("mint", FieldType::PUBKEY),
            ("owner", FieldType::PUBKEY),
            ("amount", FieldType::U64),
            ("delegateOption", FieldType::U32),
            ("delegate", FieldType::PUBKEY),
            ("state", FieldType::U8),
            ("isNativeOption", FieldType::U32),
            ("isNative", FieldType::U64),
            ("delegatedAmount", FieldType::U64),
            ("closeAuthorityOption", FieldType::U32),
            ("closeAuthority", FieldType::PUBKEY),
        ],
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init(TelemetryConfig::default())?;

    let owner = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "dammHkt7jmytvbS3nHTxQNEcP59aE57nxwV21YdqEDN".to_string());
    let endpoint = std::env::args()
        .nth(2)
        .unwrap_or_else(|| accounts_query::DEFAULT_ENDPOINT.to_string());

    let config = QueryConfig::new()
        .with_connection(RpcConnection::new(endpoint).with_commitment(Commitment::Confirmed))
        .with_options(FetchOptions::new().with_batch_delay(Duration::from_millis(500)));

    let mut query =
        AccountsQuery::new(Arc::new(token_account_schema()), "TokenAccount").with_config(config);
    query
        .at(TOKEN_PROGRAM)
        .select(["mint", "owner", "amount"])
        .where_(Where::new().eq("owner", FilterValue::address(&owner)?))
        .with_metadata(serde_json::json!({ "program": "spl-token" }));

    let records = query.fetch().await?;
    println!("Found {} token accounts owned by {}", records.len(), owner);
    for record in records {
        println!("{}", serde_json::to_string_pretty(&record.to_json())?);
    }

    Ok(())
}
