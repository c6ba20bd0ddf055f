//! Client-side session guard for the ConsoleApp web console
//!
//! [`SessionGuard`] owns the access-token lifecycle in the browser: it keeps
//! tokens in local storage, refreshes them before (or after) they expire,
//! retries a request once after a 401, protects the login page against
//! redirect loops and throttles repeated failed logins.

#[macro_use]
extern crate tracing;

pub mod claims;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod login_attempts;
pub mod page;
pub mod redirect_loop;
pub mod session;
pub mod storage;
pub mod telemetry;

pub use claims::{TokenClaims, TokenState, decode_claims};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RefreshCarrier, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use guard::{
    ApiRequest, LoginForm, LoginPageOutcome, RefreshOutcome, SessionGuard, SessionGuardBuilder,
};
pub use page::{LoggingPage, Notice, NoticeLevel, PageContext};
pub use session::{Session, SessionStore};
pub use storage::{KeyValueStore, MemoryStore, StorageError};
