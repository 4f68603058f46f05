//! iTransfer: send files and folders to an email recipient through a
//! self-hosted transfer server.
//!
//! The client side builds a selection of files (walking folders recursively,
//! preserving relative paths) and submits it as one multipart upload with
//! byte-level progress and cancellation. The server side stores each transfer
//! (zipping multi-file uploads), emails the recipient a download link, and
//! serves the payload back.

pub mod archive;
pub mod config;
pub mod logging;
pub mod notify;
pub mod selection;
pub mod server;
pub mod source;
pub mod store;
pub mod upload;
pub mod walker;
