//! Outbound HTTP client construction shared by the chat and video service
//! clients: bounded request timeout, transient-failure retries with
//! exponential backoff, and `Retry-After` awareness.

use std::time::Duration;

use anyhow::Context;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_retry_after::RetryAfterMiddleware;

pub fn retrying_client(timeout: Duration) -> anyhow::Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);

    Ok(ClientBuilder::new(client)
        .with(RetryAfterMiddleware::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}
