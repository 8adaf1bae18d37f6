use anyhow::{bail, Result};
use log::debug;
use reqwest::{Response, StatusCode};

pub async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await?;
    debug!("Request failed with {}: {}", status, body);
    if status == StatusCode::NOT_FOUND && body.is_empty() {
        bail!("{}: no such endpoint", status)
    }
    bail!("{}: {}", status, body)
}
