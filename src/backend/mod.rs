//! Client side of the text-generation runtime.
//!
//! The runtime is an opaque HTTP service: it receives the prompt text built
//! so far plus sampling constraints (token budget, stop strings, optional
//! regex) and answers with the generated continuation.

mod client;
mod http;
mod types;

use std::future::Future;

pub use client::SglangClient;
pub use types::{BackendError, GenerateRequest, SamplingParams};

/// Something that can fill a generation slot.
///
/// Implemented by [`SglangClient`] for real runs and by scripted fakes in
/// tests.
pub trait Backend: Send + Sync {
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}
