//! Delete command - Remove a document

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use metastore::DeleteDataObjectRequest;

use super::{print_raw, Session};
use crate::output::{report, Outcome};

/// Arguments for the delete command
#[derive(Args)]
pub struct DeleteArgs {
    /// Source index
    #[arg(long, short = 'i')]
    index: String,

    /// Document id
    id: String,
}

/// Run the delete command
pub async fn run(session: &Session, args: DeleteArgs) -> Result<()> {
    let client = session.client()?;

    let mut request = DeleteDataObjectRequest::new(args.index, args.id);
    if let Some(tenant) = session.tenant() {
        request = request.with_tenant_id(tenant);
    }

    let response = client.delete_data_object(request).await?;
    if response.deleted() {
        report(Outcome::Done, format!("Deleted {}", response.id().green()));
    } else {
        report(Outcome::Warning, format!("{} was not present", response.id()));
    }
    print_raw(response.parser())
}
