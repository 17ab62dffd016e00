//! CLI command implementations.
//!
//! | Module   | Commands handled        |
//! |----------|-------------------------|
//! | `run`    | `Run`                   |
//! | `state`  | `Status`, `Reset`       |
//! | `checks` | `Checks`                |

pub mod checks;
pub mod run;
pub mod state;

pub use checks::cmd_checks;
pub use run::cmd_run;
pub use state::{cmd_reset, cmd_status};
