use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::models::{
    Booking, BookingChange, BookingCounts, BookingStatus, EventType, Gig, GigMetadata, GigQuery,
    GigStatus, Venue, ViewFilter,
};
use crate::utils;

pub struct Store {
    conn: Connection,
}

const BOOKING_COLUMNS: &str = "b.id, b.gig_id, b.artist_id, b.venue_id, b.status, b.fee, \
     b.currency, b.special_request, b.booked_by, b.booked_at_utc, b.confirmed_at_utc, \
     b.cancelled_at_utc, b.cancellation_reason";

const GIG_COLUMNS: &str = "g.id, g.title, g.description, g.event_type, g.status, \
     g.starts_at_utc, g.ends_at_utc, g.timezone, g.venue_id, g.metadata, g.created_at_utc, \
     g.updated_at_utc";

impl Store {
    pub fn open_default() -> rusqlite::Result<Self> {
        let path = utils::database_path();
        utils::ensure_parent(&path);
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS gigs(
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                event_type TEXT NOT NULL,
                status TEXT NOT NULL,
                starts_at_utc TEXT NOT NULL,
                ends_at_utc TEXT,
                timezone TEXT NOT NULL,
                venue_id TEXT,
                metadata TEXT NOT NULL,
                created_at_utc TEXT NOT NULL,
                updated_at_utc TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS bookings(
                id TEXT PRIMARY KEY,
                gig_id TEXT NOT NULL,
                artist_id TEXT NOT NULL,
                venue_id TEXT,
                status TEXT NOT NULL,
                fee REAL,
                currency TEXT,
                special_request TEXT,
                booked_by TEXT NOT NULL,
                booked_at_utc TEXT NOT NULL,
                confirmed_at_utc TEXT,
                cancelled_at_utc TEXT,
                cancellation_reason TEXT
            );
            CREATE TABLE IF NOT EXISTS venues(
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                address_line1 TEXT,
                city TEXT,
                country TEXT,
                created_at_utc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_bookings_artist ON bookings(artist_id);
            CREATE INDEX IF NOT EXISTS idx_bookings_gig ON bookings(gig_id);
            CREATE INDEX IF NOT EXISTS idx_gigs_status ON gigs(status);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_venues_owner_name
                ON venues(owner_id, lower(name));",
        )?;
        Ok(())
    }

    pub fn insert_gig(&self, gig: &Gig) -> rusqlite::Result<()> {
        let metadata = metadata_json(&gig.metadata);
        self.conn.execute(
            "INSERT INTO gigs (id, title, description, event_type, status, starts_at_utc,
                 ends_at_utc, timezone, venue_id, metadata, created_at_utc, updated_at_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                gig.id,
                gig.title,
                gig.description,
                gig.event_type.as_str(),
                gig.status.as_str(),
                utils::format_ts(gig.starts_at),
                gig.ends_at.map(utils::format_ts),
                gig.timezone,
                gig.venue_id,
                metadata,
                utils::format_ts(gig.created_at),
                utils::format_ts(gig.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn update_gig(&self, gig: &Gig) -> rusqlite::Result<()> {
        let metadata = metadata_json(&gig.metadata);
        self.conn.execute(
            "UPDATE gigs SET title = ?2, description = ?3, event_type = ?4, starts_at_utc = ?5,
                 ends_at_utc = ?6, timezone = ?7, venue_id = ?8, metadata = ?9,
                 updated_at_utc = ?10
             WHERE id = ?1",
            params![
                gig.id,
                gig.title,
                gig.description,
                gig.event_type.as_str(),
                utils::format_ts(gig.starts_at),
                gig.ends_at.map(utils::format_ts),
                gig.timezone,
                gig.venue_id,
                metadata,
                utils::format_ts(gig.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_gig(&self, id: &str) -> rusqlite::Result<Option<Gig>> {
        self.conn
            .query_row(
                &format!("SELECT {GIG_COLUMNS} FROM gigs g WHERE g.id = ?1"),
                params![id],
                |row| gig_from_row(row, 0),
            )
            .optional()
    }

    pub fn list_draft_gigs(&self) -> rusqlite::Result<Vec<Gig>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GIG_COLUMNS} FROM gigs g WHERE g.status = 'draft'
             ORDER BY g.starts_at_utc ASC"
        ))?;
        let rows = stmt.query_map([], |row| gig_from_row(row, 0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Flips one draft gig to published. Conditional on the row still being
    /// draft, so two racing promotions resolve to a single winner.
    pub fn promote_draft(
        &self,
        id: &str,
        metadata: &GigMetadata,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<bool> {
        let affected = self.conn.execute(
            "UPDATE gigs SET status = 'published', metadata = ?2, updated_at_utc = ?3
             WHERE id = ?1 AND status = 'draft'",
            params![id, metadata_json(metadata), utils::format_ts(now)],
        )?;
        Ok(affected > 0)
    }

    /// Publishes unconditionally, used by the explicit publish-now action.
    pub fn force_publish(
        &self,
        id: &str,
        metadata: &GigMetadata,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<()> {
        self.conn.execute(
            "UPDATE gigs SET status = 'published', metadata = ?2, updated_at_utc = ?3
             WHERE id = ?1",
            params![id, metadata_json(metadata), utils::format_ts(now)],
        )?;
        Ok(())
    }

    pub fn insert_booking(&self, booking: &Booking) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO bookings (id, gig_id, artist_id, venue_id, status, fee, currency,
                 special_request, booked_by, booked_at_utc, confirmed_at_utc, cancelled_at_utc,
                 cancellation_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                booking.id,
                booking.gig_id,
                booking.artist_id,
                booking.venue_id,
                booking.status.as_str(),
                booking.fee,
                booking.currency,
                booking.special_request,
                booking.booked_by,
                utils::format_ts(booking.booked_at),
                booking.confirmed_at.map(utils::format_ts),
                booking.cancelled_at.map(utils::format_ts),
                booking.cancellation_reason,
            ],
        )?;
        Ok(())
    }

    pub fn get_booking(&self, id: &str) -> rusqlite::Result<Option<Booking>> {
        self.conn
            .query_row(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
                params![id],
                |row| booking_from_row(row, 0),
            )
            .optional()
    }

    pub fn get_booking_for_gig(&self, gig_id: &str) -> rusqlite::Result<Option<Booking>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.gig_id = ?1
                     ORDER BY b.booked_at_utc ASC LIMIT 1"
                ),
                params![gig_id],
                |row| booking_from_row(row, 0),
            )
            .optional()
    }

    /// Applies a planned transition conditionally on the status the guards
    /// evaluated against. `false` means another caller won the race.
    pub fn apply_booking_change(
        &self,
        id: &str,
        expected: BookingStatus,
        change: &BookingChange,
    ) -> rusqlite::Result<bool> {
        let affected = match change.next {
            BookingStatus::Confirmed => self.conn.execute(
                "UPDATE bookings SET status = ?2, confirmed_at_utc = ?3,
                     cancelled_at_utc = NULL, cancellation_reason = NULL
                 WHERE id = ?1 AND status = ?4",
                params![
                    id,
                    change.next.as_str(),
                    change.confirmed_at.map(utils::format_ts),
                    expected.as_str(),
                ],
            )?,
            BookingStatus::Cancelled => self.conn.execute(
                "UPDATE bookings SET status = ?2, cancelled_at_utc = ?3,
                     cancellation_reason = ?4
                 WHERE id = ?1 AND status = ?5",
                params![
                    id,
                    change.next.as_str(),
                    change.cancelled_at.map(utils::format_ts),
                    change.cancellation_reason,
                    expected.as_str(),
                ],
            )?,
            BookingStatus::Completed | BookingStatus::Pending => self.conn.execute(
                "UPDATE bookings SET status = ?2 WHERE id = ?1 AND status = ?3",
                params![id, change.next.as_str(), expected.as_str()],
            )?,
        };
        Ok(affected > 0)
    }

    pub fn update_booking_terms(
        &self,
        id: &str,
        fee: Option<f64>,
        currency: Option<&str>,
        special_request: Option<&str>,
    ) -> rusqlite::Result<()> {
        self.conn.execute(
            "UPDATE bookings SET
                 fee = COALESCE(?2, fee),
                 currency = COALESCE(?3, currency),
                 special_request = COALESCE(?4, special_request)
             WHERE id = ?1",
            params![id, fee, currency, special_request],
        )?;
        Ok(())
    }

    pub fn list_bookings(
        &self,
        artist_id: &str,
        query: &GigQuery,
    ) -> rusqlite::Result<Vec<(Booking, Gig)>> {
        let (where_clause, params) = build_filter(artist_id, query);
        let sql = format!(
            "SELECT {BOOKING_COLUMNS}, {GIG_COLUMNS}
             FROM bookings b JOIN gigs g ON g.id = b.gig_id
             WHERE {where_clause}
             ORDER BY g.starts_at_utc ASC
             LIMIT {} OFFSET {}",
            query.limit, query.offset
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            let booking = booking_from_row(row, 0)?;
            let gig = gig_from_row(row, 13)?;
            Ok((booking, gig))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_bookings(&self, artist_id: &str, query: &GigQuery) -> rusqlite::Result<u64> {
        let (where_clause, params) = build_filter(artist_id, query);
        let sql = format!(
            "SELECT COUNT(*) FROM bookings b JOIN gigs g ON g.id = b.gig_id
             WHERE {where_clause}"
        );
        self.conn
            .query_row(&sql, params_from_iter(params), |row| row.get::<_, i64>(0))
            .map(|count| count as u64)
    }

    pub fn booking_counts(&self, artist_id: &str) -> rusqlite::Result<BookingCounts> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM bookings WHERE artist_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map(params![artist_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = BookingCounts::default();
        for row in rows {
            let (status, count) = row?;
            match status.as_str() {
                "pending" => counts.pending = count as u32,
                "confirmed" => counts.confirmed = count as u32,
                "completed" => counts.completed = count as u32,
                _ => {}
            }
        }
        Ok(counts)
    }

    pub fn get_venue(&self, id: &str) -> rusqlite::Result<Option<Venue>> {
        self.conn
            .query_row(
                "SELECT id, owner_id, name, address_line1, city, country, created_at_utc
                 FROM venues WHERE id = ?1",
                params![id],
                venue_from_row,
            )
            .optional()
    }

    pub fn find_venue(&self, owner_id: &str, name: &str) -> rusqlite::Result<Option<Venue>> {
        self.conn
            .query_row(
                "SELECT id, owner_id, name, address_line1, city, country, created_at_utc
                 FROM venues WHERE owner_id = ?1 AND lower(name) = lower(?2)",
                params![owner_id, name],
                venue_from_row,
            )
            .optional()
    }

    pub fn insert_venue(&self, venue: &Venue) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO venues (id, owner_id, name, address_line1, city, country,
                 created_at_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO NOTHING",
            params![
                venue.id,
                venue.owner_id,
                venue.name,
                venue.address_line1,
                venue.city,
                venue.country,
                utils::format_ts(venue.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn update_venue_address(
        &self,
        id: &str,
        address_line1: Option<&str>,
        city: Option<&str>,
        country: Option<&str>,
    ) -> rusqlite::Result<()> {
        self.conn.execute(
            "UPDATE venues SET
                 address_line1 = COALESCE(?2, address_line1),
                 city = COALESCE(?3, city),
                 country = COALESCE(?4, country)
             WHERE id = ?1",
            params![id, address_line1, city, country],
        )?;
        Ok(())
    }
}

fn build_filter(artist_id: &str, query: &GigQuery) -> (String, Vec<String>) {
    let mut clauses = vec!["b.artist_id = ?".to_string()];
    let mut params = vec![artist_id.to_string()];

    match query.view {
        ViewFilter::Calendar => {
            clauses.push("b.status IN ('confirmed', 'completed')".to_string());
        }
        ViewFilter::Invites => {
            clauses.push("b.status = 'pending' AND b.booked_by != b.artist_id".to_string());
        }
        ViewFilter::Requests => {
            clauses.push("b.status = 'pending' AND b.booked_by = b.artist_id".to_string());
        }
        ViewFilter::All => {}
    }

    if let Some(statuses) = &query.statuses {
        if !statuses.is_empty() {
            let placeholders = vec!["?"; statuses.len()].join(", ");
            clauses.push(format!("b.status IN ({placeholders})"));
            params.extend(statuses.iter().map(|s| s.as_str().to_string()));
        }
    }
    if let Some(from) = query.from {
        clauses.push("g.starts_at_utc >= ?".to_string());
        params.push(utils::format_ts(from));
    }
    if let Some(until) = query.until {
        clauses.push("g.starts_at_utc <= ?".to_string());
        params.push(utils::format_ts(until));
    }

    (clauses.join(" AND "), params)
}

fn metadata_json(metadata: &GigMetadata) -> String {
    serde_json::to_string(metadata).expect("metadata serialization")
}

fn conversion_err(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn parse_required_ts(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    utils::parse_ts(raw).ok_or_else(|| conversion_err(idx, format!("bad timestamp: {raw}")))
}

fn parse_optional_ts(idx: usize, raw: Option<String>) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    match raw {
        Some(value) => parse_required_ts(idx, &value).map(Some),
        None => Ok(None),
    }
}

fn gig_from_row(row: &Row<'_>, base: usize) -> Result<Gig, rusqlite::Error> {
    let event_type_raw: String = row.get(base + 3)?;
    let event_type = EventType::parse(&event_type_raw)
        .ok_or_else(|| conversion_err(base + 3, format!("unknown event type: {event_type_raw}")))?;
    let status_raw: String = row.get(base + 4)?;
    let status = GigStatus::parse(&status_raw)
        .ok_or_else(|| conversion_err(base + 4, format!("unknown gig status: {status_raw}")))?;
    let starts_raw: String = row.get(base + 5)?;
    let ends_raw: Option<String> = row.get(base + 6)?;
    let payload: String = row.get(base + 9)?;
    let metadata: GigMetadata = serde_json::from_str(&payload).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            payload.len(),
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })?;
    let created_raw: String = row.get(base + 10)?;
    let updated_raw: String = row.get(base + 11)?;

    Ok(Gig {
        id: row.get(base)?,
        title: row.get(base + 1)?,
        description: row.get(base + 2)?,
        event_type,
        status,
        starts_at: parse_required_ts(base + 5, &starts_raw)?,
        ends_at: parse_optional_ts(base + 6, ends_raw)?,
        timezone: row.get(base + 7)?,
        venue_id: row.get(base + 8)?,
        metadata,
        created_at: parse_required_ts(base + 10, &created_raw)?,
        updated_at: parse_required_ts(base + 11, &updated_raw)?,
    })
}

fn booking_from_row(row: &Row<'_>, base: usize) -> Result<Booking, rusqlite::Error> {
    let status_raw: String = row.get(base + 4)?;
    let status = BookingStatus::parse(&status_raw)
        .ok_or_else(|| conversion_err(base + 4, format!("unknown booking status: {status_raw}")))?;
    let booked_raw: String = row.get(base + 9)?;
    let confirmed_raw: Option<String> = row.get(base + 10)?;
    let cancelled_raw: Option<String> = row.get(base + 11)?;

    Ok(Booking {
        id: row.get(base)?,
        gig_id: row.get(base + 1)?,
        artist_id: row.get(base + 2)?,
        venue_id: row.get(base + 3)?,
        status,
        fee: row.get(base + 5)?,
        currency: row.get(base + 6)?,
        special_request: row.get(base + 7)?,
        booked_by: row.get(base + 8)?,
        booked_at: parse_required_ts(base + 9, &booked_raw)?,
        confirmed_at: parse_optional_ts(base + 10, confirmed_raw)?,
        cancelled_at: parse_optional_ts(base + 11, cancelled_raw)?,
        cancellation_reason: row.get(base + 12)?,
    })
}

fn venue_from_row(row: &Row<'_>) -> Result<Venue, rusqlite::Error> {
    let created_raw: String = row.get(6)?;
    Ok(Venue {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        address_line1: row.get(3)?,
        city: row.get(4)?,
        country: row.get(5)?,
        created_at: parse_required_ts(6, &created_raw)?,
    })
}
