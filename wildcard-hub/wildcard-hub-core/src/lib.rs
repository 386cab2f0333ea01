pub mod bootstrap;
pub mod config;
pub mod diff;
pub mod document;
pub mod events;
pub mod history;
pub mod observe;
pub mod path;
pub mod storage;
pub mod store;

pub use config::StoreConfig;
pub use store::WildcardStore;
