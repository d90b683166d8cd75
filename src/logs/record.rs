//! Log Records
//!
//! One publish/delivery/expiry/failure event per line, `|` delimited.
//! The first two fields are always the event timestamp and the record
//! type tag; the tag selects the layout of the remaining fields.
//!
//! ```text
//! <ts>|PUB|<pubid>|<feedid>|<uri>|<method>|<ctype>|<clen>|<srcip>|<user>|<status>
//! <ts>|DEL|<pubid>|<feedid>|<subid>|<uri>|<method>|<ctype>|<clen>|<user>|<status>|<xpubid>
//! <ts>|EXP|<pubid>|<feedid>|<subid>|<uri>|<method>|<ctype>|<clen>|<reason>|<attempts>
//! <ts>|PBF|<pubid>|<feedid>|<uri>|<method>|<ctype>|<clen>|<clen_rcvd>|<srcip>|<user>|<error>
//! <ts>|DLX|<pubid>|<feedid>|<subid>|<clen>|<clen_rcvd>
//! <ts>|LOG|<type>|<pubid>|<feedid>|<subid>|<uri>|<method>|<ctype>|<clen>|<srcip>|<user>|<status>|<xpubid>|<reason>|<attempts>|<clen_rcvd>|<error>|<id>
//! ```
//!
//! `LOG` lines carry every column plus an explicit record id; they are
//! what one POD sends another during log replication.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use super::errors::LogParseError;

/// Event kind of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordType {
    /// File published to a feed
    Publish,
    /// File delivered to a subscriber
    Delivery,
    /// Delivery abandoned
    Expiry,
    /// Publish rejected
    PublishFailure,
    /// Delivery byte-count detail
    DeliveryExtra,
}

impl RecordType {
    /// Line tag for this type
    pub fn tag(&self) -> &'static str {
        match self {
            RecordType::Publish => "PUB",
            RecordType::Delivery => "DEL",
            RecordType::Expiry => "EXP",
            RecordType::PublishFailure => "PBF",
            RecordType::DeliveryExtra => "DLX",
        }
    }

    /// Parse a line tag. `LOG` is a line layout, not a record type.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "PUB" => Some(RecordType::Publish),
            "DEL" => Some(RecordType::Delivery),
            "EXP" => Some(RecordType::Expiry),
            "PBF" => Some(RecordType::PublishFailure),
            "DLX" => Some(RecordType::DeliveryExtra),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Tag of the full-column replication layout
pub const FULL_LOG_TAG: &str = "LOG";

const FULL_LOG_FIELDS: usize = 19;

/// A single logged event.
///
/// `record_id` is `None` until the record is persisted, unless it
/// arrived from a peer with its id attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub record_id: Option<u64>,
    pub event_time: DateTime<Utc>,
    pub record_type: RecordType,
    pub publish_id: String,
    pub feed_id: u64,
    pub sub_id: Option<u64>,
    pub request_uri: String,
    pub method: String,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub source_ip: String,
    pub user: String,
    pub status: Option<u16>,
    pub delivery_pub_id: String,
    pub reason: String,
    pub attempts: Option<u32>,
    pub content_length_received: Option<u64>,
    pub error: String,
}

/// Identity of an event independent of its record id.
///
/// Used to recognise a re-uploaded line that was already persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub event_time: DateTime<Utc>,
    pub record_type: RecordType,
    pub publish_id: String,
    pub feed_id: u64,
    pub sub_id: Option<u64>,
}

impl LogRecord {
    /// Create a record with only the common columns filled.
    pub fn new(
        event_time: DateTime<Utc>,
        record_type: RecordType,
        publish_id: impl Into<String>,
        feed_id: u64,
    ) -> Self {
        Self {
            record_id: None,
            event_time,
            record_type,
            publish_id: publish_id.into(),
            feed_id,
            sub_id: None,
            request_uri: String::new(),
            method: String::new(),
            content_type: String::new(),
            content_length: None,
            source_ip: String::new(),
            user: String::new(),
            status: None,
            delivery_pub_id: String::new(),
            reason: String::new(),
            attempts: None,
            content_length_received: None,
            error: String::new(),
        }
    }

    /// Same record with `record_id` set.
    pub fn with_id(mut self, record_id: u64) -> Self {
        self.record_id = Some(record_id);
        self
    }

    /// UTC calendar day of the event.
    pub fn day(&self) -> NaiveDate {
        self.event_time.date_naive()
    }

    pub fn event_key(&self) -> EventKey {
        EventKey {
            event_time: self.event_time,
            record_type: self.record_type,
            publish_id: self.publish_id.clone(),
            feed_id: self.feed_id,
            sub_id: self.sub_id,
        }
    }

    /// Render as a full-column `LOG` line (no trailing newline).
    ///
    /// Records without an id render an empty id column.
    pub fn to_log_line(&self) -> String {
        let columns: [String; FULL_LOG_FIELDS] = [
            self.event_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            FULL_LOG_TAG.to_string(),
            self.record_type.tag().to_string(),
            clean(&self.publish_id),
            self.feed_id.to_string(),
            opt(self.sub_id),
            clean(&self.request_uri),
            clean(&self.method),
            clean(&self.content_type),
            opt(self.content_length),
            clean(&self.source_ip),
            clean(&self.user),
            opt(self.status),
            clean(&self.delivery_pub_id),
            clean(&self.reason),
            opt(self.attempts),
            opt(self.content_length_received),
            clean(&self.error),
            opt(self.record_id),
        ];
        columns.join("|")
    }

    /// Parse one line in any of the supported layouts.
    pub fn parse_line(line: &str) -> Result<Self, LogParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(LogParseError::Empty);
        }

        let f: Vec<&str> = line.split('|').collect();
        if f.len() < 2 {
            return Err(LogParseError::FieldCount {
                tag: "any",
                expected: 2,
                found: f.len(),
            });
        }

        let event_time = parse_time(f[0])?;
        let tag = f[1];

        if tag == FULL_LOG_TAG {
            return parse_full(event_time, &f);
        }

        let record_type =
            RecordType::from_tag(tag).ok_or_else(|| LogParseError::UnknownType(tag.to_string()))?;

        let mut record = LogRecord::new(event_time, record_type, "", 0);
        match record_type {
            RecordType::Publish => {
                expect_fields(record_type.tag(), &f, 11)?;
                record.publish_id = f[2].to_string();
                record.feed_id = num("feedid", f[3])?;
                record.request_uri = f[4].to_string();
                record.method = f[5].to_string();
                record.content_type = f[6].to_string();
                record.content_length = opt_num("clen", f[7])?;
                record.source_ip = f[8].to_string();
                record.user = f[9].to_string();
                record.status = opt_num("status", f[10])?;
            }
            RecordType::Delivery => {
                expect_fields(record_type.tag(), &f, 12)?;
                record.publish_id = f[2].to_string();
                record.feed_id = num("feedid", f[3])?;
                record.sub_id = Some(num("subid", f[4])?);
                record.request_uri = f[5].to_string();
                record.method = f[6].to_string();
                record.content_type = f[7].to_string();
                record.content_length = opt_num("clen", f[8])?;
                record.user = f[9].to_string();
                record.status = opt_num("status", f[10])?;
                record.delivery_pub_id = f[11].to_string();
            }
            RecordType::Expiry => {
                expect_fields(record_type.tag(), &f, 11)?;
                record.publish_id = f[2].to_string();
                record.feed_id = num("feedid", f[3])?;
                record.sub_id = Some(num("subid", f[4])?);
                record.request_uri = f[5].to_string();
                record.method = f[6].to_string();
                record.content_type = f[7].to_string();
                record.content_length = opt_num("clen", f[8])?;
                record.reason = f[9].to_string();
                record.attempts = opt_num("attempts", f[10])?;
            }
            RecordType::PublishFailure => {
                expect_fields(record_type.tag(), &f, 12)?;
                record.publish_id = f[2].to_string();
                record.feed_id = num("feedid", f[3])?;
                record.request_uri = f[4].to_string();
                record.method = f[5].to_string();
                record.content_type = f[6].to_string();
                record.content_length = opt_num("clen", f[7])?;
                record.content_length_received = opt_num("clen_rcvd", f[8])?;
                record.source_ip = f[9].to_string();
                record.user = f[10].to_string();
                record.error = f[11].to_string();
            }
            RecordType::DeliveryExtra => {
                expect_fields(record_type.tag(), &f, 7)?;
                record.publish_id = f[2].to_string();
                record.feed_id = num("feedid", f[3])?;
                record.sub_id = Some(num("subid", f[4])?);
                record.content_length = opt_num("clen", f[5])?;
                record.content_length_received = opt_num("clen_rcvd", f[6])?;
            }
        }

        Ok(record)
    }
}

impl FromStr for LogRecord {
    type Err = LogParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::parse_line(line)
    }
}

fn parse_full(event_time: DateTime<Utc>, f: &[&str]) -> Result<LogRecord, LogParseError> {
    expect_fields(FULL_LOG_TAG, f, FULL_LOG_FIELDS)?;

    let record_type =
        RecordType::from_tag(f[2]).ok_or_else(|| LogParseError::UnknownType(f[2].to_string()))?;

    let record_id: u64 = num("id", f[18])?;

    Ok(LogRecord {
        record_id: Some(record_id),
        event_time,
        record_type,
        publish_id: f[3].to_string(),
        feed_id: num("feedid", f[4])?,
        sub_id: opt_num("subid", f[5])?,
        request_uri: f[6].to_string(),
        method: f[7].to_string(),
        content_type: f[8].to_string(),
        content_length: opt_num("clen", f[9])?,
        source_ip: f[10].to_string(),
        user: f[11].to_string(),
        status: opt_num("status", f[12])?,
        delivery_pub_id: f[13].to_string(),
        reason: f[14].to_string(),
        attempts: opt_num("attempts", f[15])?,
        content_length_received: opt_num("clen_rcvd", f[16])?,
        error: f[17].to_string(),
    })
}

fn parse_time(text: &str) -> Result<DateTime<Utc>, LogParseError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| LogParseError::BadTimestamp(text.to_string()))
}

fn expect_fields(tag: &'static str, f: &[&str], expected: usize) -> Result<(), LogParseError> {
    if f.len() != expected {
        return Err(LogParseError::FieldCount {
            tag,
            expected,
            found: f.len(),
        });
    }
    Ok(())
}

fn num<T: FromStr>(field: &'static str, value: &str) -> Result<T, LogParseError> {
    value.trim().parse().map_err(|_| LogParseError::BadField {
        field,
        value: value.to_string(),
    })
}

fn opt_num<T: FromStr>(field: &'static str, value: &str) -> Result<Option<T>, LogParseError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    num(field, value).map(Some)
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Column text with delimiter and line breaks removed.
fn clean(value: &str) -> String {
    value.replace(['|', '\n', '\r'], " ")
}
