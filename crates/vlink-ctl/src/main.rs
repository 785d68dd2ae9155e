//! vlink-ctl: command-line interface for the vlink daemon.

mod cmd;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 3000;

fn print_usage() {
    println!("Usage: vlink-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                           Show connected peers and catalog size");
    println!("  files                            List the shared catalog");
    println!("  get <index> [--out <path>]       Download a catalog file");
    println!("  publish [--token <t>] <path>...  Replace the catalog with local files");
    println!();
    println!("Options:");
    println!("  --port <port>   Daemon port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Pull out valued options; everything else is positional.
    let mut port = DEFAULT_PORT;
    let mut out: Option<String> = None;
    let mut token: Option<String> = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--out" => {
                i += 1;
                out = Some(args.get(i).context("--out requires a path")?.clone());
            }
            "--token" => {
                i += 1;
                token = Some(args.get(i).context("--token requires a value")?.clone());
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["files"] => cmd::files::cmd_files(port).await,
        ["get", index] => {
            let index: usize = index.parse().context("index must be a non-negative number")?;
            cmd::files::cmd_get(port, index, out.as_deref()).await
        }
        ["publish", paths @ ..] if !paths.is_empty() => {
            cmd::files::cmd_publish(port, paths, token.as_deref()).await
        }
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            print_usage();
            std::process::exit(1);
        }
    }
}
