pub mod complete;
pub mod export;
pub mod import;
pub mod resolve;
pub mod search;
pub mod session;
pub mod tag_ops;
pub mod template_ops;
pub mod tree_ops;
