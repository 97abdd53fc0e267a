//! Sign-in event ledger: records member sign-ins, enforces a per-type
//! cooldown, and ranks members over trailing or calendar-day windows.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod context;
pub mod cooldown;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod rank;
pub mod report;
pub mod store;

pub use aggregate::Window;
pub use context::RequestContext;
pub use cooldown::{cooldown, Admission, COOLDOWN_HOURS};
pub use error::{SigninError, SigninResult};
pub use ledger::SigninLedger;
pub use models::{Pair, RankedList, SigninEvent, SigninType, TypeFilter, User};
