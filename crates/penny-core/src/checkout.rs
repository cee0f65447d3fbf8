//! Checkout aggregation.
//!
//! A member's donations are grouped by the pledge-platform campaign id of the
//! beneficiary behind each campaign, so several pages paying into the same
//! pledge collapse into one line. Donations to campaigns without a
//! beneficiary land in a single unassigned group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  beneficiary::PledgeCampaignId,
  campaign::CampaignLink,
  store::LedgerStore,
};

/// One donation joined with its campaign's beneficiary, if any.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
  pub link:        CampaignLink,
  pub unit_count:  u64,
  pub beneficiary: Option<BeneficiaryRef>,
}

#[derive(Debug, Clone)]
pub struct BeneficiaryRef {
  pub beneficiary_id:       Uuid,
  pub pledge_campaign_id:   PledgeCampaignId,
  pub pledge_platform_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutGroup {
  /// `None` for the unassigned group.
  pub beneficiary_id:     Option<Uuid>,
  pub pledge_campaign_id: Option<PledgeCampaignId>,
  pub beneficiary_name:   Option<String>,
  pub total_units:        u64,
  pub campaign_links:     Vec<CampaignLink>,
  /// Whether the pledge total has reached the checkout threshold.
  pub checkout_open:      bool,
}

impl CheckoutGroup {
  fn empty(beneficiary: Option<&BeneficiaryRef>) -> Self {
    Self {
      beneficiary_id:     beneficiary.map(|b| b.beneficiary_id),
      pledge_campaign_id: beneficiary.map(|b| b.pledge_campaign_id),
      beneficiary_name:   beneficiary.map(|b| b.pledge_platform_name.clone()),
      total_units:        0,
      campaign_links:     Vec::new(),
      checkout_open:      false,
    }
  }

  fn add(&mut self, line: CheckoutLine) {
    self.total_units += line.unit_count;
    self.campaign_links.push(line.link);
  }

  pub fn is_unassigned(&self) -> bool { self.pledge_campaign_id.is_none() }
}

/// Partition `lines` by pledge campaign id.
///
/// Assigned groups come out in ascending pledge id order, followed by the
/// unassigned group if there is one. Links keep their input order.
pub fn group_for_checkout(
  lines: impl IntoIterator<Item = CheckoutLine>,
  min_checkout_units: u64,
) -> Vec<CheckoutGroup> {
  let mut assigned: BTreeMap<PledgeCampaignId, CheckoutGroup> = BTreeMap::new();
  let mut unassigned: Option<CheckoutGroup> = None;

  for line in lines {
    let group = match line.beneficiary.as_ref().map(|b| b.pledge_campaign_id) {
      Some(pledge) => assigned
        .entry(pledge)
        .or_insert_with(|| CheckoutGroup::empty(line.beneficiary.as_ref())),
      None => unassigned.get_or_insert_with(|| CheckoutGroup::empty(None)),
    };
    group.add(line);
  }

  let mut groups: Vec<CheckoutGroup> = assigned
    .into_values()
    .map(|mut g| {
      g.checkout_open = g.total_units >= min_checkout_units;
      g
    })
    .collect();
  groups.extend(unassigned);
  groups
}

/// Load a member's checkout lines from `store` and group them.
pub async fn checkout_view<S: LedgerStore>(
  store: &S,
  member_id: Uuid,
  min_checkout_units: u64,
) -> Result<Vec<CheckoutGroup>, S::Error> {
  let lines = store.checkout_lines(member_id).await?;
  Ok(group_for_checkout(lines, min_checkout_units))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn line(link: &str, units: u64, pledge: Option<u64>) -> CheckoutLine {
    CheckoutLine {
      link:        CampaignLink::parse(link).unwrap(),
      unit_count:  units,
      beneficiary: pledge.map(|p| BeneficiaryRef {
        beneficiary_id:       Uuid::from_u128(p as u128),
        pledge_campaign_id:   PledgeCampaignId::new(p),
        pledge_platform_name: format!("pledge {p}"),
      }),
    }
  }

  #[test]
  fn shared_pledge_id_collapses_into_one_group() {
    let groups = group_for_checkout(
      vec![
        line("http://example.com/x", 3, Some(42)),
        line("http://example.com/y", 5, Some(42)),
      ],
      1000,
    );
    assert_eq!(groups.len(), 1);
    let g = &groups[0];
    assert_eq!(g.pledge_campaign_id, Some(PledgeCampaignId::new(42)));
    assert_eq!(g.total_units, 8);
    assert_eq!(g.beneficiary_name.as_deref(), Some("pledge 42"));
    let links: Vec<&str> = g.campaign_links.iter().map(CampaignLink::as_str).collect();
    assert_eq!(links, ["http://example.com/x", "http://example.com/y"]);
  }

  #[test]
  fn unassigned_donations_share_one_trailing_group() {
    let groups = group_for_checkout(
      vec![
        line("http://example.com/a", 1, None),
        line("http://example.com/b", 2, Some(9)),
        line("http://example.com/c", 4, None),
        line("http://example.com/d", 1, Some(3)),
      ],
      1000,
    );
    let keys: Vec<Option<u64>> = groups
      .iter()
      .map(|g| g.pledge_campaign_id.map(PledgeCampaignId::get))
      .collect();
    assert_eq!(keys, [Some(3), Some(9), None]);

    let unassigned = groups.last().unwrap();
    assert!(unassigned.is_unassigned());
    assert_eq!(unassigned.total_units, 5);
    assert!(unassigned.beneficiary_id.is_none());
    assert_eq!(unassigned.campaign_links.len(), 2);
  }

  #[test]
  fn checkout_opens_at_threshold() {
    let groups = group_for_checkout(
      vec![
        line("http://example.com/a", 10, Some(1)),
        line("http://example.com/b", 9, Some(2)),
        line("http://example.com/c", 50, None),
      ],
      10,
    );
    assert!(groups[0].checkout_open);
    assert!(!groups[1].checkout_open);
    assert!(!groups[2].checkout_open, "unassigned never opens");
  }

  #[test]
  fn no_lines_no_groups() {
    assert!(group_for_checkout(Vec::new(), 1).is_empty());
  }
}
