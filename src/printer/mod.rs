//! Print-server integration.

pub mod octoprint;

pub use octoprint::{OctoPrintClient, PrinterError, UploadResponse, UploadedFile};
