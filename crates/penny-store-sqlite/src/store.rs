//! [`SqliteStore`], the SQLite implementation of [`LedgerStore`].

use std::path::Path;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use penny_core::{
  beneficiary::{Beneficiary, NewBeneficiary, PledgeCampaignId},
  campaign::{Campaign, CampaignLink},
  checkout::CheckoutLine,
  donation::{
    CounterCorrection, Donation, DonationState, LedgerReceipt, MemberDonations,
  },
  member::{ExternalIdentity, HashedKey, Member},
  store::LedgerStore,
};

use crate::{Error, Result, options::StoreOptions, queries, schema::SCHEMA};

type CoreError = penny_core::Error;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A penny ledger backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  options:         StoreOptions,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default [`StoreOptions`].
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, options };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, options: StoreOptions::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let busy_timeout = self.options.busy_timeout;
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a read-only body on the connection thread.
  async fn read<T, F>(&self, body: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(body(conn))).await?
  }

  /// Run `body` inside one `BEGIN IMMEDIATE` transaction.
  ///
  /// The transaction commits only if `body` returns `Ok`. When SQLite reports
  /// the database busy, the whole body is re-run after a backoff, up to
  /// `max_attempts` times in total.
  async fn write<T, F>(&self, op: &'static str, body: F) -> Result<T>
  where
    T: Send + 'static,
    F: Fn(&Transaction<'_>) -> Result<T> + Clone + Send + 'static,
  {
    let mut attempt = 1;
    loop {
      let body = body.clone();
      let outcome = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
          let value = match body(&tx) {
            Ok(value) => value,
            Err(e) => return Ok(Err(e)),
          };
          tx.commit()?;
          Ok(Ok(value))
        })
        .await
        .map_err(Error::from)
        .and_then(|inner| inner);

      match outcome {
        Err(e) if e.is_busy() => {
          if attempt >= self.options.max_attempts {
            warn!(op, attempt, "database still busy, giving up");
            return Err(CoreError::ConcurrencyConflict { attempts: attempt }.into());
          }
          let delay = self.options.delay_after(attempt);
          warn!(op, attempt, ?delay, "database busy, retrying transaction");
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        other => return other,
      }
    }
  }
}

/// Re-read a campaign inside the transaction that just touched it.
fn reload_campaign(tx: &Connection, campaign_id: Uuid, link: &CampaignLink) -> Result<Campaign> {
  queries::campaign_by_id(tx, campaign_id)?
    .ok_or_else(|| CoreError::CampaignNotFound(link.to_string()).into())
}

fn donation_not_found(member_id: Uuid, link: &CampaignLink) -> Error {
  CoreError::DonationNotFound { member_id, link: link.to_string() }.into()
}

/// Reject `input` if another beneficiary already holds its identity or its
/// pledge campaign id. `editing` is ignored in both checks.
fn check_beneficiary_conflicts(
  tx: &Connection,
  input: &NewBeneficiary,
  editing: Option<Uuid>,
) -> Result<()> {
  let others = |b: &Beneficiary| Some(b.beneficiary_id) != editing;

  if queries::beneficiaries_by_identity(tx, &input.external_identity)?
    .iter()
    .any(others)
  {
    return Err(
      CoreError::Conflict(format!(
        "{} already has a beneficiary",
        input.external_identity
      ))
      .into(),
    );
  }
  if queries::beneficiary_by_pledge(tx, input.pledge_campaign_id)?
    .as_ref()
    .is_some_and(others)
  {
    return Err(
      CoreError::Conflict(format!(
        "pledge campaign {} already has a beneficiary",
        input.pledge_campaign_id
      ))
      .into(),
    );
  }
  Ok(())
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  type Error = Error;

  // ── Identity ──────────────────────────────────────────────────────────────

  #[tracing::instrument(skip(self))]
  async fn resolve_member(&self, identity: ExternalIdentity) -> Result<Member> {
    let lookup = identity.clone();
    if let Some(member) = self
      .read(move |conn| queries::member_by_identity(conn, &lookup))
      .await?
    {
      return Ok(member);
    }

    // Re-checked under the write lock: a concurrent request may have won.
    let (member, created) = self
      .write("resolve_member", move |tx| {
        if let Some(existing) = queries::member_by_identity(tx, &identity)? {
          return Ok((existing, false));
        }
        let member = Member::new(identity.clone(), queries::now());
        queries::insert_member(tx, &member)?;
        Ok((member, true))
      })
      .await?;

    if created {
      info!(member_id = %member.member_id, "registered member");
    }
    Ok(member)
  }

  async fn member_by_hashed_key(&self, key: HashedKey) -> Result<Member> {
    self
      .read(move |conn| queries::member_by_hashed_key(conn, &key))
      .await?
      .ok_or_else(|| CoreError::MemberNotFound.into())
  }

  // ── Campaign registry ─────────────────────────────────────────────────────

  async fn get_or_create_campaign(&self, link: CampaignLink) -> Result<Campaign> {
    let (campaign, created) = self
      .write("get_or_create_campaign", move |tx| {
        queries::get_or_create_campaign(tx, &link, queries::now())
      })
      .await?;
    if created {
      info!(link = %campaign.link, "registered campaign");
    }
    Ok(campaign)
  }

  async fn find_campaign(&self, link: CampaignLink) -> Result<Option<Campaign>> {
    self.read(move |conn| queries::campaign_by_link(conn, &link)).await
  }

  async fn list_recent_campaigns(&self, limit: usize) -> Result<Vec<Campaign>> {
    self.read(move |conn| queries::recent_campaigns(conn, limit)).await
  }

  async fn list_unassigned_campaigns(&self) -> Result<Vec<Campaign>> {
    self.read(queries::unassigned_campaigns).await
  }

  #[tracing::instrument(skip(self))]
  async fn assign_beneficiary(
    &self,
    link: CampaignLink,
    pledge_id: PledgeCampaignId,
  ) -> Result<Campaign> {
    let campaign = self
      .write("assign_beneficiary", move |tx| {
        let campaign = queries::campaign_by_link(tx, &link)?
          .ok_or_else(|| CoreError::CampaignNotFound(link.to_string()))?;
        let beneficiary = queries::beneficiary_by_pledge(tx, pledge_id)?
          .ok_or_else(|| {
            CoreError::BeneficiaryNotFound(format!("pledge campaign {pledge_id}"))
          })?;
        queries::set_campaign_beneficiary(
          tx,
          campaign.campaign_id,
          Some(beneficiary.beneficiary_id),
        )?;
        reload_campaign(tx, campaign.campaign_id, &link)
      })
      .await?;
    info!(link = %campaign.link, "assigned beneficiary");
    Ok(campaign)
  }

  // ── Ledger ────────────────────────────────────────────────────────────────

  #[tracing::instrument(skip(self))]
  async fn donate(&self, member_id: Uuid, link: CampaignLink) -> Result<LedgerReceipt> {
    let (receipt, created) = self
      .write("donate", move |tx| {
        if !queries::member_exists(tx, member_id)? {
          return Err(CoreError::MemberNotFound.into());
        }
        let now = queries::now();
        let (campaign, created) = queries::get_or_create_campaign(tx, &link, now)?;

        let donation = match queries::load_donation(tx, member_id, campaign.campaign_id)? {
          Some(mut existing) => {
            existing.record(now);
            existing
          }
          None => Donation::first(member_id, campaign.campaign_id, now),
        };
        queries::save_donation(tx, &donation)?;
        queries::adjust_counter(tx, campaign.campaign_id, 1, now)?;

        let campaign = reload_campaign(tx, campaign.campaign_id, &link)?;
        Ok((LedgerReceipt { campaign, state: DonationState::Active(donation) }, created))
      })
      .await?;

    if created {
      info!(link = %receipt.campaign.link, "registered campaign");
    }
    debug!(
      units = receipt.state.unit_count(),
      counter = receipt.campaign.counter,
      "donated"
    );
    Ok(receipt)
  }

  #[tracing::instrument(skip(self))]
  async fn undo(&self, member_id: Uuid, link: CampaignLink) -> Result<LedgerReceipt> {
    let receipt = self
      .write("undo", move |tx| {
        let campaign = queries::campaign_by_link(tx, &link)?
          .ok_or_else(|| donation_not_found(member_id, &link))?;
        let donation = queries::load_donation(tx, member_id, campaign.campaign_id)?
          .ok_or_else(|| donation_not_found(member_id, &link))?;

        let now = queries::now();
        let state = donation.undo(now);
        match &state {
          DonationState::Active(remaining) => queries::save_donation(tx, remaining)?,
          DonationState::NonExistent => {
            queries::remove_donation(tx, member_id, campaign.campaign_id)?
          }
        }
        queries::adjust_counter(tx, campaign.campaign_id, -1, now)?;

        let campaign = reload_campaign(tx, campaign.campaign_id, &link)?;
        Ok(LedgerReceipt { campaign, state })
      })
      .await?;

    debug!(
      units = receipt.state.unit_count(),
      counter = receipt.campaign.counter,
      "undid one unit"
    );
    Ok(receipt)
  }

  #[tracing::instrument(skip(self))]
  async fn delete_donation(&self, member_id: Uuid, link: CampaignLink) -> Result<()> {
    let removed = self
      .write("delete_donation", move |tx| {
        let campaign = queries::campaign_by_link(tx, &link)?
          .ok_or_else(|| donation_not_found(member_id, &link))?;
        let donation = queries::load_donation(tx, member_id, campaign.campaign_id)?
          .ok_or_else(|| donation_not_found(member_id, &link))?;

        let units = donation.unit_count();
        queries::remove_donation(tx, member_id, campaign.campaign_id)?;
        queries::adjust_counter(
          tx,
          campaign.campaign_id,
          -i64::try_from(units).unwrap_or(i64::MAX),
          queries::now(),
        )?;
        Ok(units)
      })
      .await?;

    debug!(units = removed, "deleted donation");
    Ok(())
  }

  async fn get_donation(&self, member_id: Uuid, link: CampaignLink) -> Result<Option<Donation>> {
    self
      .read(move |conn| match queries::campaign_by_link(conn, &link)? {
        Some(campaign) => queries::load_donation(conn, member_id, campaign.campaign_id),
        None => Ok(None),
      })
      .await
  }

  async fn list_member_donations(&self, member_id: Uuid) -> Result<MemberDonations> {
    let entries = self
      .read(move |conn| queries::member_donations(conn, member_id))
      .await?;
    Ok(MemberDonations::new(member_id, entries))
  }

  async fn checkout_lines(&self, member_id: Uuid) -> Result<Vec<CheckoutLine>> {
    self
      .read(move |conn| queries::checkout_lines(conn, member_id))
      .await
  }

  #[tracing::instrument(skip(self))]
  async fn reconcile_counters(&self) -> Result<Vec<CounterCorrection>> {
    let corrections = self
      .write("reconcile_counters", |tx| queries::reconcile_counters(tx))
      .await?;
    for c in &corrections {
      warn!(link = %c.link, stored = c.stored, actual = c.actual, "repaired campaign counter");
    }
    Ok(corrections)
  }

  // ── Beneficiaries ─────────────────────────────────────────────────────────

  #[tracing::instrument(skip(self))]
  async fn create_beneficiary(&self, input: NewBeneficiary) -> Result<Beneficiary> {
    let beneficiary = self
      .write("create_beneficiary", move |tx| {
        check_beneficiary_conflicts(tx, &input, None)?;
        let beneficiary = input.clone().into_beneficiary(queries::now());
        queries::upsert_beneficiary(tx, &beneficiary)?;
        Ok(beneficiary)
      })
      .await?;
    info!(beneficiary_id = %beneficiary.beneficiary_id, "created beneficiary");
    Ok(beneficiary)
  }

  #[tracing::instrument(skip(self))]
  async fn edit_beneficiary(&self, id: Uuid, input: NewBeneficiary) -> Result<Beneficiary> {
    self
      .write("edit_beneficiary", move |tx| {
        let existing = queries::beneficiary_by_id(tx, id)?
          .ok_or_else(|| CoreError::BeneficiaryNotFound(id.to_string()))?;
        check_beneficiary_conflicts(tx, &input, Some(id))?;

        let updated = Beneficiary {
          beneficiary_id:       id,
          external_identity:    input.external_identity.clone(),
          payout_email:         input.payout_email.clone(),
          pledge_campaign_id:   input.pledge_campaign_id,
          pledge_platform_name: input.pledge_platform_name.clone(),
          created_at:           existing.created_at,
          updated_at:           queries::now(),
        };
        queries::upsert_beneficiary(tx, &updated)?;
        Ok(updated)
      })
      .await
  }

  #[tracing::instrument(skip(self))]
  async fn delete_beneficiary(&self, id: Uuid) -> Result<u64> {
    let cleared = self
      .write("delete_beneficiary", move |tx| {
        if queries::beneficiary_by_id(tx, id)?.is_none() {
          return Err(CoreError::BeneficiaryNotFound(id.to_string()).into());
        }
        let cleared = queries::clear_beneficiary(tx, id)?;
        queries::delete_beneficiary(tx, id)?;
        Ok(cleared)
      })
      .await?;
    info!(cleared, "deleted beneficiary");
    Ok(cleared)
  }

  async fn get_beneficiary(&self, id: Uuid) -> Result<Option<Beneficiary>> {
    self.read(move |conn| queries::beneficiary_by_id(conn, id)).await
  }

  async fn list_beneficiaries(&self) -> Result<Vec<Beneficiary>> {
    self.read(queries::all_beneficiaries).await
  }
}
