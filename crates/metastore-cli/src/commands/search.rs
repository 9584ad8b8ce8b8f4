//! Search command - Run a query against one or more indices
//!
//! Usage:
//! ```bash
//! metastore search --index agents,models '{"query": {"match": {"name": "a1"}}, "size": 5}'
//! ```

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use metastore::SearchDataObjectRequest;

use super::{split_list, Session};

/// Arguments for the search command
#[derive(Args)]
pub struct SearchArgs {
    /// Indices to search (comma-separated, repeatable)
    #[arg(long, short = 'i', required = true)]
    index: Vec<String>,

    /// Search source; matches everything when omitted
    #[arg(default_value = "{}")]
    query: String,

    /// Print the full backend response instead of the hit sources
    #[arg(long)]
    raw: bool,
}

/// Run the search command
pub async fn run(session: &Session, args: SearchArgs) -> Result<()> {
    let indices = split_list(&args.index);
    if indices.is_empty() {
        bail!("At least one index is required");
    }
    let client = session.client()?;

    let mut request = SearchDataObjectRequest::from_json(indices, &args.query)?;
    if let Some(tenant) = session.tenant() {
        request = request.with_tenant_id(tenant);
    }

    let response = client.search_data_object(request).await?;
    if args.raw {
        println!("{}", serde_json::to_string_pretty(&response.parser().to_value()?)?);
        return Ok(());
    }

    let result = response.search_result()?;
    let total = result
        .hits
        .total
        .as_ref()
        .map(|t| t.value)
        .unwrap_or(result.hits.hits.len() as u64);
    println!(
        "{} {} ({} ms)",
        total.to_string().bold(),
        "hits".bold(),
        result.took
    );
    for hit in &result.hits.hits {
        println!("{} {}", "•".cyan(), hit.id.green());
        if let Some(source) = &hit.source {
            println!("  {}", serde_json::to_string(source)?);
        }
    }
    Ok(())
}
