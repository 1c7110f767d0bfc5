//! Digilistan, the weekly chart of Sveriges Radio
//!
//! The chart page is scraped into an ordered list of references. Rows that
//! carry a play id become `sverigesradio:<id>` uris and seed the CDN cache
//! with their title/artist; rows without one become `_search:` references
//! that another source has to resolve.
//!
//! The show airs on Sundays around noon. Between 11:30 and 15:00 the chart
//! may change at any time, so the playlist expires after ten minutes;
//! outside that window it stays valid until the next broadcast starts.

use crate::cdn::CdnTrackCache;
use crate::client::SverigesRadioClient;
use crate::error::{Error, Result};
use crate::models::{Playlist, TrackId, DIGILISTAN_URI, SEARCH_SCHEME};
use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDate, NaiveTime, TimeZone, Weekday};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};

/// Playlist title
pub const DIGILISTAN_TITLE: &str = "Digilistan";

/// Local time at which the live window opens
pub const LIVE_WINDOW_START: (u32, u32) = (11, 30);

/// Local time at which the live window closes
pub const LIVE_WINDOW_END: (u32, u32) = (15, 0);

/// Lifetime of the playlist while the show is on air
pub const LIVE_REFRESH_MINUTES: i64 = 10;

const ROW_SELECTOR: &str = "article.music-toplist li.track";
const NAME_SELECTOR: &str = "span.track-title, span.track__title";
const PLAY_SELECTOR: &str = ".track__play > a";
const PLAY_ID_ATTR: &str = "data-audio-id";

/// Characters left alone by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

// ============================================================================
// Expiry
// ============================================================================

/// When a chart fetched at `now` stops being valid
pub fn valid_to<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    if is_live(now) {
        return now.clone() + Duration::minutes(LIVE_REFRESH_MINUTES);
    }
    next_broadcast(now)
}

/// Strictly inside Sunday 11:30–15:00, local time
pub fn is_live<Tz: TimeZone>(now: &DateTime<Tz>) -> bool {
    if now.weekday() != Weekday::Sun {
        return false;
    }

    let tz = now.timezone();
    let today = now.date_naive();
    match (
        local_at(&tz, today, LIVE_WINDOW_START),
        local_at(&tz, today, LIVE_WINDOW_END),
    ) {
        (Some(start), Some(end)) => start < *now && *now < end,
        _ => false,
    }
}

/// The first Sunday 11:30 strictly after `now`
pub fn next_broadcast<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let days_to_sunday = (7 - now.weekday().num_days_from_sunday()) % 7;
    let sunday = now.date_naive() + Days::new(u64::from(days_to_sunday));

    [sunday, sunday + Days::new(7)]
        .into_iter()
        .filter_map(|day| local_at(&tz, day, LIVE_WINDOW_START))
        .find(|start| start > now)
        .unwrap_or_else(|| now.clone() + Duration::days(7))
}

fn local_at<Tz: TimeZone>(tz: &Tz, date: NaiveDate, (hour, min): (u32, u32)) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour, min, 0)?;
    tz.from_local_datetime(&date.and_time(time)).earliest()
}

// ============================================================================
// Parsing
// ============================================================================

/// Where a chart row points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackRef {
    /// Playable through the CDN
    Cdn(TrackId),
    /// Free-text query, already percent-encoded
    Search(String),
}

impl TrackRef {
    /// The string placed in the playlist contents
    pub fn to_uri(&self) -> String {
        match self {
            TrackRef::Cdn(id) => id.uri(),
            TrackRef::Search(query) => format!("{}{}", SEARCH_SCHEME, query),
        }
    }
}

/// One successfully parsed chart row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRow {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub track: TrackRef,
}

/// A chart row that could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// Position of the row on the page (0-based)
    pub index: usize,
    pub reason: String,
}

/// Rows of a chart page, in page order, plus the ones that were skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedChart {
    pub rows: Vec<ChartRow>,
    pub skipped: Vec<SkippedRow>,
}

/// Parse a chart page
///
/// Fails only if the selectors themselves are unusable; a bad row is
/// reported in [`ParsedChart::skipped`] and the others are kept.
pub fn parse_chart(html: &str) -> Result<ParsedChart> {
    let rows = selector(ROW_SELECTOR)?;
    let name = selector(NAME_SELECTOR)?;
    let play = selector(PLAY_SELECTOR)?;

    let document = Html::parse_document(html);
    let mut chart = ParsedChart::default();

    for (index, li) in document.select(&rows).enumerate() {
        match parse_row(li, &name, &play) {
            Ok(row) => chart.rows.push(row),
            Err(reason) => chart.skipped.push(SkippedRow { index, reason }),
        }
    }

    Ok(chart)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::scraping_error(format!("bad selector {:?}: {}", css, e)))
}

fn parse_row(
    li: ElementRef<'_>,
    name_selector: &Selector,
    play_selector: &Selector,
) -> std::result::Result<ChartRow, String> {
    let name = li
        .select(name_selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|n| !n.is_empty());

    let (artist, title) = match &name {
        Some(name) => split_name(name),
        None => (None, None),
    };

    let play_id = li
        .select(play_selector)
        .next()
        .and_then(|a| a.value().attr(PLAY_ID_ATTR))
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .and_then(TrackId::new);

    let track = match play_id {
        Some(id) => TrackRef::Cdn(id),
        None if name.is_some() => TrackRef::Search(search_query(artist.as_deref(), title.as_deref())),
        None => return Err("row has neither a play id nor a track title".to_string()),
    };

    Ok(ChartRow { artist, title, track })
}

/// `"Artist - Title"`: first segment is the artist, the rest the title
pub fn split_name(name: &str) -> (Option<String>, Option<String>) {
    let mut parts = name.splitn(2, " - ");
    let artist = parts.next().map(str::to_string).filter(|s| !s.is_empty());
    let title = parts.next().map(str::to_string).filter(|s| !s.is_empty());
    (artist, title)
}

/// `encodeURIComponent("artist title")`
pub fn search_query(artist: Option<&str>, title: Option<&str>) -> String {
    let text = [artist, title].into_iter().flatten().collect::<Vec<_>>().join(" ");
    utf8_percent_encode(&text, URI_COMPONENT).to_string()
}

// ============================================================================
// Scraper
// ============================================================================

/// Result of one scrape: the playlist and the rows left out of it
#[derive(Debug, Clone, PartialEq)]
pub struct DigilistanScrape {
    pub playlist: Playlist,
    pub skipped: Vec<SkippedRow>,
}

/// Fetches the chart and feeds the CDN cache with what it learns
#[derive(Debug, Clone)]
pub struct DigilistanScraper {
    client: SverigesRadioClient,
    cache: Arc<CdnTrackCache>,
}

impl DigilistanScraper {
    pub fn new(client: SverigesRadioClient, cache: Arc<CdnTrackCache>) -> Self {
        Self { client, cache }
    }

    /// Scrape the chart now
    pub async fn scrape(&self) -> Result<DigilistanScrape> {
        self.scrape_at(Local::now()).await
    }

    /// Scrape the chart, computing expiry relative to `now`
    pub async fn scrape_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Result<DigilistanScrape> {
        let valid_to = valid_to(&now).timestamp();

        let html = self.client.fetch_digilistan_html().await?;
        let chart = parse_chart(&html)?;

        for skipped in &chart.skipped {
            warn!(index = skipped.index, reason = %skipped.reason, "Failed to process Digilistan row");
        }

        let mut contents = Vec::with_capacity(chart.rows.len());
        for row in chart.rows {
            if let TrackRef::Cdn(id) = row.track {
                self.cache.merge_scraped(id, row.title, row.artist).await;
            }
            contents.push(row.track.to_uri());
        }

        debug!(tracks = contents.len(), skipped = chart.skipped.len(), valid_to, "Scraped Digilistan");

        Ok(DigilistanScrape {
            playlist: Playlist {
                uri: DIGILISTAN_URI.to_string(),
                title: DIGILISTAN_TITLE.to_string(),
                valid_to,
                contents,
            },
            skipped: chart.skipped,
        })
    }
}
