//! `smartzone get`: one object as the controller holds it, secrets masked.

use smartzone_core::Controller;

use crate::cli::{GetArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    controller: &Controller,
    args: GetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let resource = controller
        .get(args.kind, args.zone.as_deref(), args.name.as_deref())
        .await?;
    let out = output::render_single(global.format(), &resource)?;
    output::print_output(&out);
    Ok(())
}
