use chrono::Utc;
use uuid::Uuid;

use tiny_agent_graph::actions::ActionRegistry;
use tiny_agent_graph::models::{BusinessObjectRow, BusinessObjectStatus};

fn object(status: BusinessObjectStatus, amount: f64) -> BusinessObjectRow {
    BusinessObjectRow {
        id: Uuid::new_v4(),
        status,
        amount,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn validate_order_requires_positive_amount() {
    let registry = ActionRegistry::new();
    let validate = registry.get("validate_order").unwrap();

    let mut obj = object(BusinessObjectStatus::Pending, 0.0);
    assert!(validate(&mut obj).is_err());

    let mut obj = object(BusinessObjectStatus::Pending, 49.99);
    validate(&mut obj).unwrap();
    assert_eq!(obj.status, BusinessObjectStatus::Validated);
}

#[test]
fn full_lifecycle_transitions_in_order() {
    let registry = ActionRegistry::new();
    let validate = registry.get("validate_order").unwrap();
    let charge = registry.get("charge_payment").unwrap();
    let ship = registry.get("ship_order").unwrap();

    let mut obj = object(BusinessObjectStatus::Pending, 49.99);
    validate(&mut obj).unwrap();
    charge(&mut obj).unwrap();
    ship(&mut obj).unwrap();
    assert_eq!(obj.status, BusinessObjectStatus::Shipped);
}

#[test]
fn charge_before_validate_is_rejected() {
    let registry = ActionRegistry::new();
    let charge = registry.get("charge_payment").unwrap();

    let mut obj = object(BusinessObjectStatus::Pending, 49.99);
    assert!(charge(&mut obj).is_err());
}

#[test]
fn send_notification_never_changes_status() {
    let registry = ActionRegistry::new();
    let notify = registry.get("send_notification").unwrap();

    let mut obj = object(BusinessObjectStatus::Charged, 49.99);
    notify(&mut obj).unwrap();
    assert_eq!(obj.status, BusinessObjectStatus::Charged);
}

#[test]
fn unknown_action_is_not_registered() {
    let registry = ActionRegistry::new();
    assert!(registry.get("delete_universe").is_none());
}
