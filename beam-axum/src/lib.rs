//! beam-axum: the HTTP surface of Beam.
//!
//! | Route | |
//! |---|---|
//! | `POST /api/upload` | multipart field `document`, optional `burn_after` and `expire_in` |
//! | `GET /api/meta/{code}` | file metadata |
//! | `GET /api/download/{code}` | file bytes as an attachment |
//! | `GET /health` | `ok` |
//!
//! Anything else falls through to the static asset directory when one is set.

pub mod app;
pub mod multipart;
pub mod rest;
pub mod state;
mod error;
pub use error::BeamAxumError;
pub use state::BeamAxumState;

pub use app::{beam, BeamApp};
pub use multipart::MultipartConfig;
