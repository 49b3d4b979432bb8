//! Development aid: probe a single candidate source the way the daemon
//! would before accepting it, without touching the store.
//!
//! Usage: `prismis-tool <url> <feed|forum|video|file>`

use std::process::ExitCode;

use prismisd::validator::validate_source_str;

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let (Some(url), Some(kind)) = (args.next(), args.next()) else {
        eprintln!("usage: prismis-tool <url> <feed|forum|video|file>");
        return ExitCode::FAILURE;
    };

    let (ok, reason) = validate_source_str(&url, &kind).await;
    if ok {
        println!("ok: {url} ({kind})");
        ExitCode::SUCCESS
    } else {
        println!("rejected: {}", reason.unwrap_or_else(|| "unknown reason".to_string()));
        ExitCode::FAILURE
    }
}
