//! plangrid-store: durable store for execution-plan files.
//!
//! Plans are persisted as text files, one per plan, inside a per-tenant
//! repository directory:
//!
//! ```text
//! <root>/
//!   -1234/executionplans/OrderAlerts.siddhiql
//!   7/executionplans/Fraud.siddhiql
//! ```
//!
//! [`ConfigFileStore`] is the contract the lifecycle core depends on;
//! [`FsConfigStore`] implements it on the local filesystem. Files are keyed
//! by bare filename, so one tenant can never address another tenant's
//! directory.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{ConfigFileStore, FsConfigStore, PLAN_DIRECTORY};
