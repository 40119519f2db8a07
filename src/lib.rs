//! # Grantflow
//!
//! Draft grant applications and funder reports section by section.
//!
//! A draft starts from a grant or report in the fixture catalog. Grant
//! applications get their sections from a simulated RFP analysis; inline
//! applications and reports load a static template. Sections are filled by
//! hand or by simulated draft generation, tracked for completion, and
//! submitted once every required section is done.
//!
//! ## Quick Start
//!
//! ```bash
//! # List grants and reports
//! grantflow list
//!
//! # Draft an application for grant-1 and submit it
//! grantflow draft grant-1 --fast --submit
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::unnecessary_map_or)]

pub mod core;
pub mod fixtures;
pub mod workflow;

// Re-export commonly used types
pub use core::{AppSession, Config};
pub use fixtures::FixtureCatalog;
pub use workflow::{DraftingSession, WorkflowError, WorkflowKind, WorkflowPhase};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "grantflow";
