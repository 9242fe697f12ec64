//! CLI command implementations

mod agency;
mod config_gen;
mod flags;
mod schedules;

pub use agency::create_agency;
pub use config_gen::config_generate;
pub use flags::{list_flags, set_flag, unset_flag};
pub use schedules::tick_once;
