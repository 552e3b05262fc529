//! # fpsync-client
//!
//! Remote Directory Client for the F&P assessment platform.
//!
//! [`DirectoryClient`] is the seam the sync engine is written against;
//! [`HttpClient`] talks to the real platform. With the `testing` feature,
//! `InMemoryDirectory` is a self-contained stand-in that applies writes to
//! its own state.

pub mod api;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use api::{
    DirectoryClient, EnrollmentRequest, ExportClient, ExportFile, NewStudent, TransferRequest,
};
pub use error::ClientError;
pub use http::HttpClient;
#[cfg(any(test, feature = "testing"))]
pub use memory::{InMemoryDirectory, WriteCall};
