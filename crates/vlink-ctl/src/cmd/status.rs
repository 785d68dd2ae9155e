//! Daemon status command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    peers: usize,
    files: usize,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  vlink Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Connected peers : {}", resp.peers);
    println!("  Catalog entries : {}", resp.files);

    Ok(())
}
