//! SQL schema for the penny SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS members (
    member_id         TEXT PRIMARY KEY,
    external_identity TEXT NOT NULL,
    hashed_key        TEXT NOT NULL,   -- written once at insert, never updated
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS beneficiaries (
    beneficiary_id       TEXT PRIMARY KEY,
    external_identity    TEXT NOT NULL,
    payout_email         TEXT NOT NULL,
    pledge_campaign_id   INTEGER NOT NULL,
    pledge_platform_name TEXT NOT NULL,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS campaigns (
    campaign_id      TEXT PRIMARY KEY,
    link             TEXT NOT NULL,
    beneficiary_id   TEXT REFERENCES beneficiaries(beneficiary_id) ON DELETE SET NULL,
    created_at       TEXT NOT NULL,
    last_activity_at TEXT NOT NULL,
    counter          INTEGER NOT NULL DEFAULT 0 CHECK (counter >= 0)
);

-- One row per (member, campaign). `timestamps` is a JSON array of RFC 3339
-- instants in append order; `unit_count` mirrors its length.
CREATE TABLE IF NOT EXISTS donations (
    member_id   TEXT NOT NULL REFERENCES members(member_id),
    campaign_id TEXT NOT NULL REFERENCES campaigns(campaign_id),
    timestamps  TEXT NOT NULL,
    unit_count  INTEGER NOT NULL CHECK (unit_count > 0),
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (member_id, campaign_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS members_identity_uidx   ON members(external_identity);
CREATE UNIQUE INDEX IF NOT EXISTS members_hashed_key_uidx ON members(hashed_key);
CREATE UNIQUE INDEX IF NOT EXISTS campaigns_link_uidx     ON campaigns(link);
CREATE UNIQUE INDEX IF NOT EXISTS beneficiaries_pledge_uidx
    ON beneficiaries(pledge_campaign_id);

CREATE INDEX IF NOT EXISTS campaigns_beneficiary_idx ON campaigns(beneficiary_id);
CREATE INDEX IF NOT EXISTS campaigns_activity_idx    ON campaigns(last_activity_at);
CREATE INDEX IF NOT EXISTS donations_campaign_idx    ON donations(campaign_id);
CREATE INDEX IF NOT EXISTS donations_member_idx      ON donations(member_id, updated_at);

PRAGMA user_version = 1;
";
