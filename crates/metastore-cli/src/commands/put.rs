//! Put command - Store a document
//!
//! Usage:
//! ```bash
//! metastore put --index agents '{"name": "a1"}'
//! metastore put --index agents --id a1 --no-overwrite --file agent.json
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use metastore::PutDataObjectRequest;
use serde_json::Value;
use std::path::PathBuf;

use super::{print_raw, read_object, Session};
use crate::output::{report, Outcome};

/// Arguments for the put command
#[derive(Args)]
pub struct PutArgs {
    /// Target index
    #[arg(long, short = 'i')]
    index: String,

    /// Document id; generated when omitted
    #[arg(long)]
    id: Option<String>,

    /// Fail instead of replacing an existing document
    #[arg(long)]
    no_overwrite: bool,

    /// Read the document from a file
    #[arg(long, short = 'f', value_name = "FILE")]
    file: Option<PathBuf>,

    /// Document as inline JSON
    document: Option<String>,
}

/// Run the put command
pub async fn run(session: &Session, args: PutArgs) -> Result<()> {
    let document = read_object(args.document, args.file)?;
    let client = session.client()?;

    let mut request = PutDataObjectRequest::new(args.index, Value::Object(document))
        .with_overwrite_if_exists(!args.no_overwrite);
    if let Some(id) = args.id {
        request = request.with_id(id);
    }
    if let Some(tenant) = session.tenant() {
        request = request.with_tenant_id(tenant);
    }

    let response = client.put_data_object(request).await?;
    let verb = if response.created() { "Created" } else { "Stored" };
    report(Outcome::Done, format!("{} {}", verb, response.id().green()));
    print_raw(response.parser())
}
