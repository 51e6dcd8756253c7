//! Subscription plan policy for the PassVault client.
//!
//! Pure, synchronous checks of a [`PlanDescriptor`] against the current vault
//! state. Both the sync layer and the front end use these functions, so the
//! "add" button and the create call agree on what is allowed.
//!
//! The server remains the enforcement authority; everything here is a
//! best-effort pre-check.

use serde::{Deserialize, Serialize};

use passvault_common::{Error, PlanDescriptor, Result};

/// Usage share (percent) at which a warning is shown.
const WARNING_PERCENT: u64 = 75;
/// Usage share (percent) at which usage is critical.
const CRITICAL_PERCENT: u64 = 90;

/// How close the vault is to its item limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    None,
    Warning,
    Critical,
}

/// Utilization report for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationWarning {
    pub severity: Severity,
    /// Empty when severity is `None`.
    pub message: String,
}

/// Signed free slots; negative when the vault is already over its limit.
pub fn headroom(plan: &PlanDescriptor, item_count: usize) -> i64 {
    i64::from(plan.max_vault_items) - item_count as i64
}

/// Free slots for reporting, floored at zero.
pub fn remaining_capacity(plan: &PlanDescriptor, item_count: usize) -> u64 {
    headroom(plan, item_count).max(0) as u64
}

/// Whether one more item fits.
pub fn can_add_item(plan: &PlanDescriptor, item_count: usize) -> bool {
    (item_count as u64) < u64::from(plan.max_vault_items)
}

/// Usage percentage, floored. `None` when the plan allows no items.
fn usage_percent(plan: &PlanDescriptor, item_count: usize) -> Option<u64> {
    if plan.max_vault_items == 0 {
        return None;
    }
    Some(100 * item_count as u64 / u64::from(plan.max_vault_items))
}

/// Classify vault usage against the item limit.
///
/// Critical at 90 % and above, warning from 75 % up to 90 %. A plan with a
/// zero item limit is always critical.
pub fn utilization_warning(plan: &PlanDescriptor, item_count: usize) -> UtilizationWarning {
    let max = plan.max_vault_items;
    match usage_percent(plan, item_count) {
        Some(percent) if percent < WARNING_PERCENT => UtilizationWarning {
            severity: Severity::None,
            message: String::new(),
        },
        Some(percent) if percent < CRITICAL_PERCENT => UtilizationWarning {
            severity: Severity::Warning,
            message: format!(
                "You've used {}/{} items ({}%)",
                item_count, max, percent
            ),
        },
        _ => UtilizationWarning {
            severity: Severity::Critical,
            message: format!(
                "You've used {}/{} items. Please upgrade to add more.",
                item_count, max
            ),
        },
    }
}

/// Whether a secret of `secret_len` characters is longer than the plan allows.
pub fn password_exceeds_limit(plan: &PlanDescriptor, secret_len: usize) -> bool {
    secret_len as u64 > u64::from(plan.max_password_length)
}

pub fn can_export(plan: &PlanDescriptor) -> bool {
    plan.can_export
}

pub fn can_import(plan: &PlanDescriptor) -> bool {
    plan.can_import
}

pub fn can_share(plan: &PlanDescriptor) -> bool {
    plan.can_share
}

/// `PlanLimitExceeded` unless one more item fits.
pub fn check_add_item(plan: &PlanDescriptor, item_count: usize) -> Result<()> {
    if can_add_item(plan, item_count) {
        Ok(())
    } else {
        Err(Error::PlanLimitExceeded(format!(
            "Maximum vault items limit ({}) reached for your plan. Please upgrade.",
            plan.max_vault_items
        )))
    }
}

/// `PlanLimitExceeded` when the secret is longer than the plan allows.
pub fn check_password(plan: &PlanDescriptor, secret_len: usize) -> Result<()> {
    if password_exceeds_limit(plan, secret_len) {
        Err(Error::PlanLimitExceeded(format!(
            "Password exceeds the maximum length of {} characters for your plan",
            plan.max_password_length
        )))
    } else {
        Ok(())
    }
}

pub fn check_export(plan: &PlanDescriptor) -> Result<()> {
    capability(
        can_export(plan),
        "Export is not available for your plan. Please upgrade to Usual or Premium.",
    )
}

pub fn check_import(plan: &PlanDescriptor) -> Result<()> {
    capability(
        can_import(plan),
        "Import is not available for your plan. Please upgrade to Premium.",
    )
}

pub fn check_share(plan: &PlanDescriptor) -> Result<()> {
    capability(
        can_share(plan),
        "Sharing is not available for your plan. Please upgrade to Premium.",
    )
}

fn capability(allowed: bool, message: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::PlanLimitExceeded(message.to_string()))
    }
}
