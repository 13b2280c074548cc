//! ActionRegistry — the static name → business-logic function table
//! dispatched inside `StepExecutor`'s atomic commit.
//!
//! Actions are compiled in, not dynamically loaded: they run inside the
//! same transaction as step completion, so untrusted dynamic dispatch would
//! undermine the durability contract.

use std::collections::HashMap;

use crate::error::ActionError;
use crate::models::{BusinessObjectRow, BusinessObjectStatus};

pub type ActionFn = fn(&mut BusinessObjectRow) -> Result<(), ActionError>;

pub struct ActionRegistry {
    actions: HashMap<&'static str, ActionFn>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        let mut actions: HashMap<&'static str, ActionFn> = HashMap::new();
        actions.insert("validate_order", validate_order);
        actions.insert("charge_payment", charge_payment);
        actions.insert("ship_order", ship_order);
        actions.insert("send_notification", send_notification);
        ActionRegistry { actions }
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ActionFn> {
        self.actions.get(name).copied()
    }
}

fn validate_order(obj: &mut BusinessObjectRow) -> Result<(), ActionError> {
    if obj.amount <= 0.0 {
        return Err(ActionError::PreconditionFailed(format!(
            "amount must be > 0, got {}",
            obj.amount
        )));
    }
    obj.status = BusinessObjectStatus::Validated;
    Ok(())
}

fn charge_payment(obj: &mut BusinessObjectRow) -> Result<(), ActionError> {
    if obj.status != BusinessObjectStatus::Validated {
        return Err(ActionError::PreconditionFailed(format!(
            "expected VALIDATED, found {:?}",
            obj.status
        )));
    }
    obj.status = BusinessObjectStatus::Charged;
    Ok(())
}

fn ship_order(obj: &mut BusinessObjectRow) -> Result<(), ActionError> {
    if obj.status != BusinessObjectStatus::Charged {
        return Err(ActionError::PreconditionFailed(format!(
            "expected CHARGED, found {:?}",
            obj.status
        )));
    }
    obj.status = BusinessObjectStatus::Shipped;
    Ok(())
}

fn send_notification(_obj: &mut BusinessObjectRow) -> Result<(), ActionError> {
    Ok(())
}
