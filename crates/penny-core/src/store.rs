//! The `LedgerStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `penny-store-sqlite`).
//! `penny-api` depends on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Classify,
  beneficiary::{Beneficiary, NewBeneficiary, PledgeCampaignId},
  campaign::{Campaign, CampaignLink},
  checkout::CheckoutLine,
  donation::{CounterCorrection, Donation, LedgerReceipt, MemberDonations},
  member::{ExternalIdentity, HashedKey, Member},
};

/// Abstraction over a penny ledger backend.
///
/// Every mutating method must run as one atomic transaction: either all of
/// its writes are visible afterwards or none are. In particular a donation
/// row and its campaign's counter are always written together.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait LedgerStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Identity ──────────────────────────────────────────────────────────

  /// Return the member for `identity`, creating it (and its hashed key) on
  /// first sight.
  fn resolve_member(
    &self,
    identity: ExternalIdentity,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;

  /// Look up the member owning a bookmarklet key. Never creates.
  fn member_by_hashed_key(
    &self,
    key: HashedKey,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + '_;

  // ── Campaign registry ─────────────────────────────────────────────────

  /// Idempotent: the same link always yields the same campaign.
  fn get_or_create_campaign(
    &self,
    link: CampaignLink,
  ) -> impl Future<Output = Result<Campaign, Self::Error>> + Send + '_;

  fn find_campaign(
    &self,
    link: CampaignLink,
  ) -> impl Future<Output = Result<Option<Campaign>, Self::Error>> + Send + '_;

  /// Most recently active campaigns first.
  fn list_recent_campaigns(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Campaign>, Self::Error>> + Send + '_;

  /// Campaigns without a beneficiary, highest counter first.
  fn list_unassigned_campaigns(
    &self,
  ) -> impl Future<Output = Result<Vec<Campaign>, Self::Error>> + Send + '_;

  /// Point an existing campaign at the beneficiary owning `pledge_id`.
  fn assign_beneficiary(
    &self,
    link: CampaignLink,
    pledge_id: PledgeCampaignId,
  ) -> impl Future<Output = Result<Campaign, Self::Error>> + Send + '_;

  // ── Ledger ────────────────────────────────────────────────────────────

  /// Add exactly one unit, creating the campaign and donation as needed.
  fn donate(
    &self,
    member_id: Uuid,
    link: CampaignLink,
  ) -> impl Future<Output = Result<LedgerReceipt, Self::Error>> + Send + '_;

  /// Remove the most recent unit; the donation disappears with its last one.
  fn undo(
    &self,
    member_id: Uuid,
    link: CampaignLink,
  ) -> impl Future<Output = Result<LedgerReceipt, Self::Error>> + Send + '_;

  /// Remove the whole donation, subtracting all of its units.
  fn delete_donation(
    &self,
    member_id: Uuid,
    link: CampaignLink,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_donation(
    &self,
    member_id: Uuid,
    link: CampaignLink,
  ) -> impl Future<Output = Result<Option<Donation>, Self::Error>> + Send + '_;

  /// The member's donations, most recently touched first.
  fn list_member_donations(
    &self,
    member_id: Uuid,
  ) -> impl Future<Output = Result<MemberDonations, Self::Error>> + Send + '_;

  /// Raw rows for [`crate::checkout::group_for_checkout`].
  fn checkout_lines(
    &self,
    member_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CheckoutLine>, Self::Error>> + Send + '_;

  /// Recompute every counter from its donations and repair any drift.
  fn reconcile_counters(
    &self,
  ) -> impl Future<Output = Result<Vec<CounterCorrection>, Self::Error>> + Send + '_;

  // ── Beneficiaries (admin) ─────────────────────────────────────────────

  fn create_beneficiary(
    &self,
    input: NewBeneficiary,
  ) -> impl Future<Output = Result<Beneficiary, Self::Error>> + Send + '_;

  fn edit_beneficiary(
    &self,
    id: Uuid,
    input: NewBeneficiary,
  ) -> impl Future<Output = Result<Beneficiary, Self::Error>> + Send + '_;

  /// Delete a beneficiary and clear it from every campaign. Returns how many
  /// campaigns were cleared.
  fn delete_beneficiary(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn get_beneficiary(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Beneficiary>, Self::Error>> + Send + '_;

  fn list_beneficiaries(
    &self,
  ) -> impl Future<Output = Result<Vec<Beneficiary>, Self::Error>> + Send + '_;
}
