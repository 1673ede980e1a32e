//! Packaging the feed into a zip archive.

use std::io::{Cursor, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assemble::AssembledFeed;

use super::error::FeedError;
use super::records::{
    AgencyRecord, CalendarDateRecord, CalendarRecord, FeedInfoRecord, RouteRecord, StopRecord,
    StopTimeRecord, TripRecord, gtfs_date,
};
use super::staged::StagedFile;

/// Agency and publisher details written into the feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub agency_id: String,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
    pub agency_lang: String,
    pub agency_phone: String,
    /// `feed_info.txt` is written only when both are set.
    pub publisher_name: Option<String>,
    pub publisher_url: Option<String>,
    /// Defaults to the first service date when unset.
    pub feed_version: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            agency_id: "0".to_string(),
            agency_name: "PKP Intercity".to_string(),
            agency_url: "https://intercity.pl/".to_string(),
            agency_timezone: "Europe/Warsaw".to_string(),
            agency_lang: "pl".to_string(),
            agency_phone: "+48703200200".to_string(),
            publisher_name: None,
            publisher_url: None,
            feed_version: None,
        }
    }
}

impl FeedConfig {
    pub fn with_publisher(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.publisher_name = Some(name.into());
        self.publisher_url = Some(url.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.feed_version = Some(version.into());
        self
    }

    pub fn with_timezone(mut self, tz: chrono_tz::Tz) -> Self {
        self.agency_timezone = tz.name().to_string();
        self
    }
}

/// What went into an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    pub stops: usize,
    pub routes: usize,
    pub trips: usize,
    pub calendars: usize,
    pub stop_times: usize,
}

/// Serializes an [`AssembledFeed`] as a GTFS archive.
///
/// Entries carry a fixed timestamp, so the same feed always gives the same
/// bytes.
#[derive(Debug, Clone, Default)]
pub struct FeedWriter {
    config: FeedConfig,
}

impl FeedWriter {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Write the archive to `path`, replacing any file already there.
    ///
    /// The archive is built in a temporary file next to `path` and renamed
    /// into place, so readers never see a partial feed.
    pub fn write(&self, feed: &AssembledFeed, path: &Path) -> Result<FeedStats, FeedError> {
        let (staged, stats) = self.stage(feed, path)?;
        staged.commit()?;
        info!(
            path = %path.display(),
            trips = stats.trips,
            stops = stats.stops,
            "wrote GTFS feed"
        );
        Ok(stats)
    }

    /// Build the archive for `path` without putting it in place yet.
    pub fn stage(
        &self,
        feed: &AssembledFeed,
        path: &Path,
    ) -> Result<(StagedFile, FeedStats), FeedError> {
        let bytes = self.to_bytes(feed)?;
        let staged = StagedFile::new(path, &bytes)?;

        let stats = FeedStats {
            stops: feed.stops.len(),
            routes: feed.routes.len(),
            trips: feed.trips.len(),
            calendars: feed.calendars.len(),
            stop_times: feed.stop_time_count(),
        };
        Ok((staged, stats))
    }

    /// The archive as bytes.
    pub fn to_bytes(&self, feed: &AssembledFeed) -> Result<Vec<u8>, FeedError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, table) in self.tables(feed)? {
            zip.start_file(name, entry_options())?;
            zip.write_all(&table)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    /// File name and CSV content of every table, in archive order.
    fn tables(&self, feed: &AssembledFeed) -> Result<Vec<(&'static str, Vec<u8>)>, FeedError> {
        let c = &self.config;
        let mut tables = Vec::with_capacity(8);

        tables.push((
            "agency.txt",
            to_csv([AgencyRecord {
                agency_id: &c.agency_id,
                agency_name: &c.agency_name,
                agency_url: &c.agency_url,
                agency_timezone: &c.agency_timezone,
                agency_lang: &c.agency_lang,
                agency_phone: &c.agency_phone,
            }])?,
        ));
        tables.push(("stops.txt", to_csv(feed.stops.iter().map(StopRecord::from))?));
        tables.push((
            "routes.txt",
            to_csv(feed.routes.iter().map(|r| RouteRecord::new(&c.agency_id, r)))?,
        ));
        tables.push(("trips.txt", to_csv(feed.trips.iter().map(TripRecord::from))?));
        tables.push((
            "calendar.txt",
            to_csv(feed.calendars.iter().map(CalendarRecord::from))?,
        ));
        tables.push((
            "calendar_dates.txt",
            to_csv(feed.calendars.iter().flat_map(CalendarDateRecord::all))?,
        ));
        tables.push((
            "stop_times.txt",
            to_csv(
                feed.trips
                    .iter()
                    .flat_map(|t| t.stop_times.iter())
                    .map(StopTimeRecord::from),
            )?,
        ));

        if let (Some(name), Some(url)) = (&c.publisher_name, &c.publisher_url) {
            let version = c.feed_version.clone().unwrap_or_else(|| {
                feed.calendars
                    .iter()
                    .map(|cal| cal.key.start)
                    .min()
                    .map(gtfs_date)
                    .unwrap_or_default()
            });
            tables.push((
                "feed_info.txt",
                to_csv([FeedInfoRecord {
                    feed_publisher_name: name,
                    feed_publisher_url: url,
                    feed_lang: &c.agency_lang,
                    feed_version: &version,
                }])?,
            ));
        }

        Ok(tables)
    }
}

fn entry_options() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644)
}

/// Serialize records to CSV with a header row taken from the field names.
/// No records, no header.
pub(crate) fn to_csv<T: Serialize>(records: impl IntoIterator<Item = T>) -> Result<Vec<u8>, FeedError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| FeedError::Io(e.into_error()))
}
