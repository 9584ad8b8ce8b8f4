//! Get command - Fetch a document by id

use anyhow::Result;
use clap::Args;
use metastore::{FetchSource, GetDataObjectRequest};

use super::{split_list, Session};
use crate::output::{report, Outcome};

/// Arguments for the get command
#[derive(Args)]
pub struct GetArgs {
    /// Source index
    #[arg(long, short = 'i')]
    index: String,

    /// Document id
    id: String,

    /// Only return these fields (comma-separated, repeatable)
    #[arg(long)]
    includes: Vec<String>,

    /// Drop these fields (comma-separated, repeatable)
    #[arg(long)]
    excludes: Vec<String>,

    /// Report existence only
    #[arg(long, conflicts_with_all = ["includes", "excludes"])]
    no_source: bool,
}

/// Run the get command
pub async fn run(session: &Session, args: GetArgs) -> Result<()> {
    let client = session.client()?;

    let fetch_source = if args.no_source {
        FetchSource::none()
    } else {
        FetchSource::includes(split_list(&args.includes))
            .with_excludes(split_list(&args.excludes))
    };
    let mut request = GetDataObjectRequest::new(args.index, &args.id).with_fetch_source(fetch_source);
    if let Some(tenant) = session.tenant() {
        request = request.with_tenant_id(tenant);
    }

    let response = client.get_data_object(request).await?;
    if !response.found() {
        report(Outcome::Warning, format!("{} not found", args.id));
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(response.source())?);
    Ok(())
}
