//! Statement helpers shared by the transaction bodies in [`crate::store`].
//!
//! Everything here takes a plain `&Connection`; callers pass the open
//! `Transaction` (which derefs to one) so that all statements of an
//! operation commit or roll back together.

use chrono::{DateTime, SubsecRound as _, Utc};
use penny_core::{
  beneficiary::{Beneficiary, PledgeCampaignId},
  campaign::{Campaign, CampaignLink},
  checkout::{BeneficiaryRef, CheckoutLine},
  donation::{CounterCorrection, Donation, DonationEntry},
  error::at_most_one,
  member::{ExternalIdentity, HashedKey, Member},
};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    BENEFICIARY_COLUMNS, CAMPAIGN_COLUMNS, DONATION_COLUMNS, MEMBER_COLUMNS,
    RawBeneficiary, RawCampaign, RawDonation, RawMember, decode_count, decode_uuid,
    encode_count, encode_dt, encode_pledge_id, encode_timestamps, encode_uuid,
  },
};

/// The store's notion of "now", truncated to the stored precision so that
/// values returned from a write compare equal to the same values read back.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Members ─────────────────────────────────────────────────────────────────

fn members_where(conn: &Connection, column: &str, value: &str) -> Result<Vec<Member>> {
  let sql = format!("SELECT {MEMBER_COLUMNS} FROM members m WHERE m.{column} = ?1");
  let mut stmt = conn.prepare_cached(&sql)?;
  let raws = stmt
    .query_map(params![value], RawMember::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawMember::into_member).collect()
}

pub fn member_by_identity(
  conn: &Connection,
  identity: &ExternalIdentity,
) -> Result<Option<Member>> {
  let rows = members_where(conn, "external_identity", identity.as_str())?;
  Ok(at_most_one("member", identity.as_str(), rows)?)
}

pub fn member_by_hashed_key(conn: &Connection, key: &HashedKey) -> Result<Option<Member>> {
  let rows = members_where(conn, "hashed_key", key.as_str())?;
  Ok(at_most_one("member", key.as_str(), rows)?)
}

pub fn member_exists(conn: &Connection, member_id: Uuid) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM members WHERE member_id = ?1",
        params![encode_uuid(member_id)],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

pub fn insert_member(conn: &Connection, member: &Member) -> Result<()> {
  conn.execute(
    "INSERT INTO members (member_id, external_identity, hashed_key, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    params![
      encode_uuid(member.member_id),
      member.external_identity.as_str(),
      member.hashed_key.as_str(),
      encode_dt(member.created_at),
    ],
  )?;
  Ok(())
}

// ─── Campaigns ───────────────────────────────────────────────────────────────

pub fn campaign_by_link(conn: &Connection, link: &CampaignLink) -> Result<Option<Campaign>> {
  let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns c WHERE c.link = ?1");
  let mut stmt = conn.prepare_cached(&sql)?;
  let raws = stmt
    .query_map(params![link.as_str()], |row| RawCampaign::from_row(row, 0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let campaigns = raws
    .into_iter()
    .map(RawCampaign::into_campaign)
    .collect::<Result<Vec<_>>>()?;
  Ok(at_most_one("campaign", link.as_str(), campaigns)?)
}

pub fn campaign_by_id(conn: &Connection, campaign_id: Uuid) -> Result<Option<Campaign>> {
  let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns c WHERE c.campaign_id = ?1");
  conn
    .query_row(&sql, params![encode_uuid(campaign_id)], |row| {
      RawCampaign::from_row(row, 0)
    })
    .optional()?
    .map(RawCampaign::into_campaign)
    .transpose()
}

pub fn insert_campaign(conn: &Connection, campaign: &Campaign) -> Result<()> {
  conn.execute(
    "INSERT INTO campaigns
       (campaign_id, link, beneficiary_id, created_at, last_activity_at, counter)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![
      encode_uuid(campaign.campaign_id),
      campaign.link.as_str(),
      campaign.beneficiary_id.map(encode_uuid),
      encode_dt(campaign.created_at),
      encode_dt(campaign.last_activity_at),
      encode_count(campaign.counter),
    ],
  )?;
  Ok(())
}

/// Returns the campaign and whether it was created by this call.
pub fn get_or_create_campaign(
  conn: &Connection,
  link: &CampaignLink,
  now: DateTime<Utc>,
) -> Result<(Campaign, bool)> {
  if let Some(existing) = campaign_by_link(conn, link)? {
    return Ok((existing, false));
  }
  let campaign = Campaign::new(link.clone(), now);
  insert_campaign(conn, &campaign)?;
  Ok((campaign, true))
}

/// Add `delta` units to a campaign's counter and stamp its activity time.
pub fn adjust_counter(
  conn: &Connection,
  campaign_id: Uuid,
  delta: i64,
  now: DateTime<Utc>,
) -> Result<()> {
  conn.execute(
    "UPDATE campaigns
     SET counter = counter + ?2, last_activity_at = ?3
     WHERE campaign_id = ?1",
    params![encode_uuid(campaign_id), delta, encode_dt(now)],
  )?;
  Ok(())
}

pub fn set_campaign_beneficiary(
  conn: &Connection,
  campaign_id: Uuid,
  beneficiary_id: Option<Uuid>,
) -> Result<()> {
  conn.execute(
    "UPDATE campaigns SET beneficiary_id = ?2 WHERE campaign_id = ?1",
    params![encode_uuid(campaign_id), beneficiary_id.map(encode_uuid)],
  )?;
  Ok(())
}

// ─── Donations ───────────────────────────────────────────────────────────────

pub fn load_donation(
  conn: &Connection,
  member_id: Uuid,
  campaign_id: Uuid,
) -> Result<Option<Donation>> {
  let sql = format!(
    "SELECT {DONATION_COLUMNS} FROM donations d
     WHERE d.member_id = ?1 AND d.campaign_id = ?2"
  );
  conn
    .query_row(
      &sql,
      params![encode_uuid(member_id), encode_uuid(campaign_id)],
      |row| RawDonation::from_row(row, 0),
    )
    .optional()?
    .map(RawDonation::into_donation)
    .transpose()
}

/// Insert or overwrite the row for the donation's (member, campaign) pair.
pub fn save_donation(conn: &Connection, donation: &Donation) -> Result<()> {
  conn.execute(
    "INSERT INTO donations (member_id, campaign_id, timestamps, unit_count, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (member_id, campaign_id) DO UPDATE SET
       timestamps = excluded.timestamps,
       unit_count = excluded.unit_count,
       updated_at = excluded.updated_at",
    params![
      encode_uuid(donation.member_id),
      encode_uuid(donation.campaign_id),
      encode_timestamps(&donation.timestamps)?,
      encode_count(donation.unit_count()),
      encode_dt(donation.updated_at),
    ],
  )?;
  Ok(())
}

pub fn remove_donation(conn: &Connection, member_id: Uuid, campaign_id: Uuid) -> Result<()> {
  conn.execute(
    "DELETE FROM donations WHERE member_id = ?1 AND campaign_id = ?2",
    params![encode_uuid(member_id), encode_uuid(campaign_id)],
  )?;
  Ok(())
}

// ─── Beneficiaries ───────────────────────────────────────────────────────────

fn beneficiaries_query(
  conn: &Connection,
  tail: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<Beneficiary>> {
  let sql = format!("SELECT {BENEFICIARY_COLUMNS} FROM beneficiaries b {tail}");
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params, RawBeneficiary::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawBeneficiary::into_beneficiary).collect()
}

pub fn beneficiary_by_id(conn: &Connection, id: Uuid) -> Result<Option<Beneficiary>> {
  let rows = beneficiaries_query(conn, "WHERE b.beneficiary_id = ?1", params![encode_uuid(id)])?;
  Ok(at_most_one("beneficiary", &id.to_string(), rows)?)
}

pub fn beneficiary_by_pledge(
  conn: &Connection,
  pledge_id: PledgeCampaignId,
) -> Result<Option<Beneficiary>> {
  let rows = beneficiaries_query(
    conn,
    "WHERE b.pledge_campaign_id = ?1",
    params![encode_pledge_id(pledge_id)?],
  )?;
  Ok(at_most_one("beneficiary", &pledge_id.to_string(), rows)?)
}

pub fn beneficiaries_by_identity(
  conn: &Connection,
  identity: &ExternalIdentity,
) -> Result<Vec<Beneficiary>> {
  beneficiaries_query(conn, "WHERE b.external_identity = ?1", params![identity.as_str()])
}

pub fn all_beneficiaries(conn: &Connection) -> Result<Vec<Beneficiary>> {
  beneficiaries_query(conn, "ORDER BY b.pledge_campaign_id", [])
}

pub fn upsert_beneficiary(conn: &Connection, b: &Beneficiary) -> Result<()> {
  conn.execute(
    "INSERT INTO beneficiaries (
       beneficiary_id, external_identity, payout_email, pledge_campaign_id,
       pledge_platform_name, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT (beneficiary_id) DO UPDATE SET
       external_identity    = excluded.external_identity,
       payout_email         = excluded.payout_email,
       pledge_campaign_id   = excluded.pledge_campaign_id,
       pledge_platform_name = excluded.pledge_platform_name,
       updated_at           = excluded.updated_at",
    params![
      encode_uuid(b.beneficiary_id),
      b.external_identity.as_str(),
      b.payout_email.as_str(),
      encode_pledge_id(b.pledge_campaign_id)?,
      b.pledge_platform_name,
      encode_dt(b.created_at),
      encode_dt(b.updated_at),
    ],
  )?;
  Ok(())
}

pub fn clear_beneficiary(conn: &Connection, id: Uuid) -> Result<u64> {
  let cleared = conn.execute(
    "UPDATE campaigns SET beneficiary_id = NULL WHERE beneficiary_id = ?1",
    params![encode_uuid(id)],
  )?;
  Ok(cleared as u64)
}

pub fn delete_beneficiary(conn: &Connection, id: Uuid) -> Result<()> {
  conn.execute(
    "DELETE FROM beneficiaries WHERE beneficiary_id = ?1",
    params![encode_uuid(id)],
  )?;
  Ok(())
}

// ─── Listings ────────────────────────────────────────────────────────────────

fn campaigns_query(
  conn: &Connection,
  tail: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<Campaign>> {
  let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns c {tail}");
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params, |row| RawCampaign::from_row(row, 0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawCampaign::into_campaign).collect()
}

pub fn recent_campaigns(conn: &Connection, limit: usize) -> Result<Vec<Campaign>> {
  campaigns_query(
    conn,
    "ORDER BY c.last_activity_at DESC, c.created_at DESC LIMIT ?1",
    params![i64::try_from(limit).unwrap_or(i64::MAX)],
  )
}

pub fn unassigned_campaigns(conn: &Connection) -> Result<Vec<Campaign>> {
  campaigns_query(
    conn,
    "WHERE c.beneficiary_id IS NULL ORDER BY c.counter DESC, c.last_activity_at DESC",
    [],
  )
}

pub fn member_donations(conn: &Connection, member_id: Uuid) -> Result<Vec<DonationEntry>> {
  let sql = format!(
    "SELECT {DONATION_COLUMNS}, {CAMPAIGN_COLUMNS}
     FROM donations d
     JOIN campaigns c ON c.campaign_id = d.campaign_id
     WHERE d.member_id = ?1
     ORDER BY d.updated_at DESC, d.rowid DESC"
  );
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params![encode_uuid(member_id)], |row| {
      Ok((RawDonation::from_row(row, 0)?, RawCampaign::from_row(row, 5)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws
    .into_iter()
    .map(|(d, c)| {
      Ok(DonationEntry {
        donation: d.into_donation()?,
        campaign: c.into_campaign()?,
      })
    })
    .collect()
}

pub fn checkout_lines(conn: &Connection, member_id: Uuid) -> Result<Vec<CheckoutLine>> {
  type Raw = (String, i64, Option<String>, Option<i64>, Option<String>);

  let mut stmt = conn.prepare(
    "SELECT c.link, d.unit_count,
            b.beneficiary_id, b.pledge_campaign_id, b.pledge_platform_name
     FROM donations d
     JOIN campaigns c ON c.campaign_id = d.campaign_id
     LEFT JOIN beneficiaries b ON b.beneficiary_id = c.beneficiary_id
     WHERE d.member_id = ?1
     ORDER BY d.updated_at DESC, d.rowid DESC",
  )?;
  let raws: Vec<Raw> = stmt
    .query_map(params![encode_uuid(member_id)], |row| {
      Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws
    .into_iter()
    .map(|(link, units, b_id, pledge, name)| {
      let beneficiary = match (b_id, pledge, name) {
        (Some(id), Some(pledge), Some(name)) => Some(BeneficiaryRef {
          beneficiary_id:       decode_uuid(&id)?,
          pledge_campaign_id:   PledgeCampaignId::new(decode_count(pledge)?),
          pledge_platform_name: name,
        }),
        _ => None,
      };
      Ok(CheckoutLine {
        link: CampaignLink::parse(&link)
          .map_err(|e| Error::Decode(format!("link: {e}")))?,
        unit_count: decode_count(units)?,
        beneficiary,
      })
    })
    .collect()
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

pub fn reconcile_counters(conn: &Connection) -> Result<Vec<CounterCorrection>> {
  type Raw = (String, String, i64, i64);

  let mut stmt = conn.prepare(
    "SELECT c.campaign_id, c.link, c.counter, COALESCE(SUM(d.unit_count), 0)
     FROM campaigns c
     LEFT JOIN donations d ON d.campaign_id = c.campaign_id
     GROUP BY c.campaign_id
     HAVING c.counter != COALESCE(SUM(d.unit_count), 0)
     ORDER BY c.link",
  )?;
  let drifted: Vec<Raw> = stmt
    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut corrections = Vec::with_capacity(drifted.len());
  for (id, link, stored, actual) in drifted {
    conn.execute(
      "UPDATE campaigns SET counter = ?2 WHERE campaign_id = ?1",
      params![id, actual],
    )?;
    corrections.push(CounterCorrection {
      campaign_id: decode_uuid(&id)?,
      link,
      stored: decode_count(stored)?,
      actual: decode_count(actual)?,
    });
  }
  Ok(corrections)
}
