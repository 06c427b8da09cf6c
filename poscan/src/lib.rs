//! Asynchronous OCR pipeline for purchase-order images.
//!
//! Uploads become jobs that move through a fixed state machine
//! (`queued` → `processing` → `extracting` → `validating` → [`saving`]
//! → `done`, or `failed`), driven by in-process workers fed either from
//! an in-memory queue or by polling the job store. Progress is durable
//! after every transition and mirrored live over an event bus.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod models;
pub mod ocr;
pub mod runner;
