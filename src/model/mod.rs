pub mod checklist;
pub mod config;
pub mod id;
pub mod tag;
pub mod task;
pub mod template;

pub use checklist::*;
pub use config::*;
pub use id::*;
pub use tag::*;
pub use task::*;
pub use template::*;
