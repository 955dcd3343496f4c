//! CLI domain: parse, route, output, and presentation only.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, ConfigCommands};
pub use presentation::{
    format_config_toml, format_query_listing_json, format_query_listing_text, format_query_names,
    format_section_heading, format_validation, QueryListing,
};
pub use route::{RunContext, TerminalHooks};
