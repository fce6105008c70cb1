//! Command implementations.

pub mod policies;
pub mod run;
pub mod schedule;
pub mod setup;

pub use self::policies::{execute_create_policy, execute_delete_policy, execute_list_policies};
pub use self::run::execute_run;
pub use self::schedule::execute_schedule;
pub use self::setup::execute_setup;
