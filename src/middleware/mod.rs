//! Plug-and-play session middleware for Axum.
//!
//! Mounts the sign-in, OAuth callback, session, sign-out and signup
//! routes over any [`Directory`](crate::directory::Directory)
//! implementation, and exposes the [`CurrentUser`] extractor to the
//! rest of the application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use newsdesk_auth::middleware::{SessionRouterConfig, session_routes};
//! use newsdesk_auth::{AuthConfig, DirectoryClient};
//!
//! let config = AuthConfig::from_env()?;
//! let directory = DirectoryClient::new(&config)?;
//!
//! let app = axum::Router::new()
//!     .merge(session_routes(SessionRouterConfig::new(config), directory));
//! ```
//!
//! The Web UI talks to these routes and to [`CurrentUser`] only; it
//! never reaches the directory client directly.

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::SessionRouterConfig;
pub use error::AuthError;
pub use extractor::CurrentUser;
pub use routes::session_routes;
