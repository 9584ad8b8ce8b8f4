//! Update command - Merge fields into a document
//!
//! Usage:
//! ```bash
//! metastore update --index agents a1 '{"description": "v2"}' --if-seq-no 3 --if-primary-term 1
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use metastore::UpdateDataObjectRequest;
use serde_json::Value;
use std::path::PathBuf;

use super::{print_raw, read_object, Session};
use crate::output::{report, Outcome};

/// Arguments for the update command
#[derive(Args)]
pub struct UpdateArgs {
    /// Target index
    #[arg(long, short = 'i')]
    index: String,

    /// Document id
    id: String,

    /// Partial document as inline JSON
    document: Option<String>,

    /// Read the partial document from a file
    #[arg(long, short = 'f', value_name = "FILE")]
    file: Option<PathBuf>,

    /// Expected sequence number
    #[arg(long, requires = "if_primary_term")]
    if_seq_no: Option<i64>,

    /// Expected primary term
    #[arg(long, requires = "if_seq_no")]
    if_primary_term: Option<i64>,
}

/// Run the update command
pub async fn run(session: &Session, args: UpdateArgs) -> Result<()> {
    let document = read_object(args.document, args.file)?;
    let client = session.client()?;

    let mut request = UpdateDataObjectRequest::new(args.index, &args.id, Value::Object(document));
    if let Some(seq_no) = args.if_seq_no {
        request = request.with_if_seq_no(seq_no);
    }
    if let Some(primary_term) = args.if_primary_term {
        request = request.with_if_primary_term(primary_term);
    }
    if let Some(tenant) = session.tenant() {
        request = request.with_tenant_id(tenant);
    }

    let response = match client.update_data_object(request).await {
        Ok(response) => response,
        Err(e) if e.is_conflict() => {
            report(Outcome::Warning, "Version conflict: re-fetch the document and retry");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    if response.updated() {
        report(Outcome::Done, format!("Updated {}", response.id().green()));
    } else {
        report(Outcome::Warning, format!("{} unchanged", response.id()));
    }
    print_raw(response.parser())
}
