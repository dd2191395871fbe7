//! Execution-plan lifecycle orchestration.
//!
//! Deploys, activates, deactivates and edits execution plans per tenant,
//! keeps the persisted plan files and the running plans consistent, and
//! retries plans parked on a missing dependency once it appears.
//!
//! # Architecture
//!
//! ```text
//! LifecycleCoordinator
//!   ├── PlanEngine          (parse / instantiate plan text)
//!   ├── StreamRegistry      (resolve schemas, subscribe producers/consumers)
//!   ├── ConfigFileStore     (persisted plan files)
//!   ├── PlanRegistry        tenant → plan name → LivePlanInstance
//!   │     └── LivePlanInstance
//!   │           ├── EngineHandle
//!   │           ├── OutputListener*   (exports)
//!   │           └── InputDispatcher*  (imports)
//!   ├── ConfigFileCatalog   tenant → [ConfigFileDescriptor]
//!   └── [distributed]
//!         ├── TopologyRunner
//!         └── StatusSynchronizer → SharedStatusMap
//! ```
//!
//! Every operation takes the tenant id explicitly; no state is shared
//! between tenants.

pub mod catalog;
pub mod coordinator;
pub mod deployment;
pub mod error;
pub mod instance;
pub mod query;
pub mod registry;
pub mod wiring;

pub use catalog::ConfigFileCatalog;
pub use coordinator::LifecycleCoordinator;
pub use deployment::EditTarget;
pub use error::{LifecycleError, LifecycleResult};
pub use instance::LivePlanInstance;
pub use query::PlanStatistics;
pub use registry::PlanRegistry;
pub use wiring::{DispatchKind, InputDispatcher, OutputListener, PlanMonitor};
