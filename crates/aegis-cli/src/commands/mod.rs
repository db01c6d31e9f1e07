//! Command implementations.

pub mod clients;
pub mod keys;
pub mod migrate;
pub mod token;

use serde_json::Value;

/// Prints a JSON value for human consumption.
pub fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Turns a non-success API response into an error carrying the body.
pub async fn expect_success(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("server answered {status}: {body}");
}
