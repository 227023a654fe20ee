// CLI admin commands: regenerate, prewarm, status

use reqwest::Client;
use serde_json::Value;

use super::{base_url, connection_error_message};

/// Helper to handle reqwest errors and produce a user-friendly connection error.
fn handle_request_error(err: reqwest::Error, host: &str, port: u16) -> anyhow::Error {
    if err.is_connect() || err.is_timeout() {
        anyhow::anyhow!("{}", connection_error_message(host, port))
    } else {
        anyhow::anyhow!("Request failed: {}", err)
    }
}

/// parishmap regenerate
pub async fn cmd_regenerate(
    host: &str,
    port: u16,
    wait: bool,
    job: Option<&str>,
    cursor: Option<&str>,
    max_pages: Option<usize>,
    token: &str,
) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/regenerate", base_url(host, port));

    let mut payload = serde_json::Map::new();
    if wait {
        payload.insert("wait".to_string(), Value::Bool(true));
    }
    if let Some(job) = job {
        payload.insert("jobId".to_string(), Value::String(job.to_string()));
    }
    if let Some(cursor) = cursor {
        payload.insert("cursor".to_string(), Value::String(cursor.to_string()));
    }
    if let Some(max_pages) = max_pages {
        payload.insert("maxPages".to_string(), Value::from(max_pages));
    }

    let response = client
        .post(&url)
        .bearer_auth(token)
        .json(&Value::Object(payload))
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("Server returned an error");
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }

    let job_id = body["jobId"].as_str().unwrap_or("unknown");
    match body["status"].as_str() {
        Some("completed") => {
            println!("Regeneration complete.");
            println!("  Job:       {}", job_id);
            println!("  Features:  {}", body["features"].as_u64().unwrap_or(0));
            println!(
                "  Document:  /{}",
                body["objectKey"].as_str().unwrap_or("unknown")
            );
            println!(
                "  Updated:   {}",
                body["updatedAt"].as_str().unwrap_or("unknown")
            );
        }
        Some("in_progress") => {
            println!("Regeneration in progress.");
            println!("  Job:       {}", job_id);
            println!("  Processed: {}", body["processed"].as_u64().unwrap_or(0));
            println!(
                "  Total:     {}",
                body["totalFeatures"].as_u64().unwrap_or(0)
            );
            println!(
                "  Resume:    parishmap regenerate --job {} --token <token>",
                job_id
            );
        }
        other => {
            println!("Unexpected status: {:?}", other);
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

/// parishmap prewarm
pub async fn cmd_prewarm(host: &str, port: u16, flush: bool, token: &str) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/api/prewarm", base_url(host, port));

    let response = client
        .post(&url)
        .bearer_auth(token)
        .json(&serde_json::json!({ "flush": flush }))
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("Server returned an error");
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }

    println!("Prewarm scheduled.");
    if flush {
        println!("  Cached images will be re-fetched.");
    }

    Ok(())
}

/// parishmap status
pub async fn cmd_status(host: &str, port: u16, verbose: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let url = format!("{}/health", base_url(host, port));

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| handle_request_error(e, host, port))?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse response: {}", e))?;

    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("Server returned an error");
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }

    let server_status = body["status"].as_str().unwrap_or("unknown");
    let version = body["version"].as_str().unwrap_or("unknown");
    let uptime = body["uptime_seconds"].as_u64().unwrap_or(0);
    let published = body["published"].as_bool().unwrap_or(false);

    println!("Server Status: {}", server_status);
    println!("  Address:    http://{}:{}", host, port);
    println!(
        "  Document:   {}",
        if published { "published" } else { "not published" }
    );
    println!("  Uptime:     {}", format_uptime(uptime));
    println!("  Version:    {}", version);

    if verbose {
        println!("\nRaw response:");
        println!("{}", serde_json::to_string_pretty(&body)?);
    }

    Ok(())
}

/// Format an uptime in seconds as a human-readable duration.
fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime_seconds() {
        assert_eq!(format_uptime(45), "45s");
    }

    #[test]
    fn test_format_uptime_minutes() {
        assert_eq!(format_uptime(125), "2m 5s");
    }

    #[test]
    fn test_format_uptime_hours() {
        assert_eq!(format_uptime(3725), "1h 2m 5s");
    }

    #[test]
    fn test_format_uptime_days() {
        assert_eq!(format_uptime(90061), "1d 1h 1m");
    }
}
