//! Everything the lobby does with the external core binary.
//!
//! - [`Launcher`] / [`CoreLauncher`]: start a match core and wait for its
//!   readiness byte on an inherited pipe
//! - `CoreHandle`: exit tracking for a launched core (unix)
//! - [`manifest`]: the player manifest passed on the command line
//! - [`CardCatalog`]: the additional cards export, cached between requests
//!
//! ```text
//! Lobby loop ──MatchPlan──▶ Launcher ──spawn──▶ core
//!     ▲                                          │
//!     └──────── port on exit ◀── CoreHandle ◀────┘
//! ```

mod catalog;
mod error;
#[cfg(unix)]
mod handle;
mod launcher;
pub mod manifest;

pub use catalog::CardCatalog;
pub use error::{CatalogError, LaunchError};
#[cfg(unix)]
pub use handle::CoreHandle;
#[cfg(not(unix))]
pub use launcher::NoCore;
pub use launcher::{CoreInfo, CoreLauncher, Launcher, READY_SENTINEL, match_arguments};
