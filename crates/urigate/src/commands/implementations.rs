//! `urigate implementations`: list registered implementations of an interface.

use tabled::Tabled;
use urigate_core::Uri;

use crate::cli::{GlobalOpts, ImplementationsArgs};
use crate::error::CliError;
use crate::output;

use super::{build_client, parse_uri};

#[derive(Tabled)]
struct ImplementationRow {
    #[tabled(rename = "Implementation")]
    uri: String,
    #[tabled(rename = "Authority")]
    authority: String,
    #[tabled(rename = "Path")]
    path: String,
}

fn row(uri: &Uri) -> ImplementationRow {
    ImplementationRow {
        uri: uri.to_string(),
        authority: uri.authority().to_owned(),
        path: uri.path().to_owned(),
    }
}

pub fn handle(args: &ImplementationsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let interface = parse_uri(&args.interface)?;
    let client = build_client(global)?;
    let found = client.implementations(&interface, args.apply_redirects)?;

    let rendered = output::render_list(&global.output, &found, row, ToString::to_string)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
