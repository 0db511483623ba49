//! Line-oriented front end for the patchwise session core.
//!
//! ## Backend selection
//!
//! - `PATCHWISE_BACKEND=mock` (default) answers from a scripted local backend
//! - `PATCHWISE_BACKEND=http` posts requests to an HTTP proposal service
//! - `PATCHWISE_BACKEND=process` runs `PATCHWISE_PROCESS_COMMAND` once per
//!   request, exchanging JSON over stdin/stdout
//!
//! With `http`, set `PATCHWISE_HTTP_CONFIG_PATH` to a JSON file:
//!
//! ```json
//! {
//!   "endpoint": "http://127.0.0.1:8765",
//!   "models": ["default"],
//!   "timeout_sec": 120
//! }
//! ```
//!
//! `endpoint` and a non-empty `models` list are required, `timeout_sec` must be
//! greater than zero when given, `api_key` is optional and unknown fields are
//! rejected.
//!
//! Other variables: `PATCHWISE_MODEL`, `PATCHWISE_WORKSPACE`,
//! `PATCHWISE_FILE_EXTENSIONS` (comma separated), `PATCHWISE_PROCESS_TIMEOUT_SEC`,
//! `PATCHWISE_LOADING_HINT` and `PATCHWISE_LOG` (a `tracing` filter, logs go
//! to stderr).

pub mod app;
pub mod backends;
pub mod commands;
pub mod config;
