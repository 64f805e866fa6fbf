//! CLI domain: parse, route, output, and presentation only.
//! No view orchestration here; the route table hands work to the controller.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{format_check_result, format_event_line, format_states};
pub use route::RunContext;
