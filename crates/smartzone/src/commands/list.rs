//! `smartzone list`: every object of a kind.

use tabled::Tabled;

use smartzone_core::{Controller, Resource, ResourceKind};

use crate::cli::{GlobalOpts, ListArgs};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl ResourceRow {
    fn new(kind: ResourceKind, resource: &Resource) -> Self {
        let text = |field: &str| resource.get(field).map(output::cell).unwrap_or_default();
        Self {
            id: resource.id().unwrap_or_default().to_owned(),
            name: text(kind.identity_field()),
            description: text("description"),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: ListArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let resources = controller.list(args.kind, args.zone.as_deref()).await?;
    let out = output::render_list(global.format(), &resources, |r| {
        ResourceRow::new(args.kind, r)
    })?;
    output::print_output(&out);
    Ok(())
}
