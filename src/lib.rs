pub mod activity;
pub mod actor;
pub mod catalog;
pub mod config;
pub mod editor;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod line;
pub mod logging;
pub mod notes;
pub mod permissions;
pub mod request;
pub mod revision;
pub mod service;
pub mod store;
pub mod transition;
pub mod units;
pub mod utils;

pub use actor::{Actor, Role};
pub use editor::{LineAction, RequestEditor, SaveMode};
pub use error::{RequestError, ValidationError};
pub use lifecycle::{RequestStatus, derive_lifecycle_status};
pub use request::RequestDoc;
pub use service::RequestService;
pub use transition::StoreTransition;
