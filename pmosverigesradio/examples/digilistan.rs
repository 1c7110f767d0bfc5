//! Example: print the current Digilistan chart and resolve its first clip
//!
//! Run with: cargo run -p pmosverigesradio --example digilistan
//!
//! Set `RUST_LOG=pmosverigesradio=debug` to see the requests.

use chrono::{Local, TimeZone};
use pmosverigesradio::{SverigesRadioSource, UriDetails, UriProvider};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let source = SverigesRadioSource::new().await?;

    println!("Fetching Digilistan...\n");
    let scrape = source.digilistan().scrape().await?;
    let playlist = scrape.playlist;

    if let Some(valid_to) = Local.timestamp_opt(playlist.valid_to, 0).single() {
        println!("Valid until {}", valid_to.format("%A %Y-%m-%d %H:%M"));
    }
    if !scrape.skipped.is_empty() {
        println!("{} row(s) skipped", scrape.skipped.len());
    }

    println!("\n=== {} ({}) ===", playlist.title, playlist.contents.len());
    for (i, uri) in playlist.contents.iter().enumerate() {
        println!("  {:2}. {}", i + 1, uri);
    }

    let Some(first) = playlist
        .contents
        .iter()
        .find(|uri| uri.starts_with("sverigesradio:"))
    else {
        println!("\nNo playable clip on the chart");
        return Ok(());
    };

    println!("\nResolving {}...", first);
    if !source.can_play_uri(first).await? {
        anyhow::bail!("{} is not playable", first);
    }

    if let UriDetails::Track(track) = source.get_uri_details(first).await? {
        println!("  Title:    {}", track.title.as_deref().unwrap_or("?"));
        println!("  Artist:   {}", track.artist.as_deref().unwrap_or("?"));
        println!("  Audio:    {}", track.contents.as_deref().unwrap_or("?"));
        if let Some(duration) = track.duration {
            println!("  Duration: {:.0}s", duration);
        }
        if let Some(codec) = &track.format.codec {
            println!("  Codec:    {}", codec);
        }
    }

    Ok(())
}
