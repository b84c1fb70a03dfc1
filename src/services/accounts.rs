use log::info;

use super::ports::SubscriptionStore;
use crate::error::CoreResult;
use crate::models::Account;

/// Deletes `account_id` with everything it owns. Returns `None` when there
/// is no such account.
pub async fn remove_account<S>(store: &S, account_id: &str) -> CoreResult<Option<Account>>
where
    S: SubscriptionStore + ?Sized,
{
    let Some(account) = store.get_account(account_id).await? else {
        return Ok(None);
    };

    store.delete_account(&account.id).await?;
    info!("Removed account {} ({})", account.id, account.email);
    Ok(Some(account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::models::{
        Payment, PaymentStatus, PlanDuration, PlanSelection, SeatType, Shift, SubscriptionRecord,
        SubscriptionWrite, ValidityWindow,
    };
    use crate::services::testing::{InMemoryStore, at, student};

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.add_account(student("stu-1", "Asha", Some("9876543210")));

        let plan = PlanSelection::new(PlanDuration::OneMonth, Shift::FullDay, SeatType::Regular);
        let write = SubscriptionWrite {
            plan: plan.label(),
            plan_selection: Some(plan),
            window: ValidityWindow {
                start_date: at(2025, 1, 1),
                end_date: at(2025, 2, 1),
            },
            amount: 850,
            expected_revision: None,
            order_id: None,
            written_at: at(2025, 1, 1),
        };
        store.put_subscription(SubscriptionRecord::next("stu-1", None, &write));
        store.put_payment(Payment {
            order_id: "order_1".to_string(),
            account_id: "stu-1".to_string(),
            plan_selection: plan,
            amount: 850,
            status: PaymentStatus::Paid,
            payment_id: Some("pay_1".to_string()),
            created_at: at(2025, 1, 1),
            updated_at: at(2025, 1, 1),
        });
        store
    }

    #[tokio::test]
    async fn removes_account_subscription_and_payments() {
        let store = seeded();
        let removed = remove_account(&store, "stu-1").await.unwrap();

        assert_eq!(removed.map(|a| a.id).as_deref(), Some("stu-1"));
        assert!(store.get_account("stu-1").await.unwrap().is_none());
        assert!(store.subscription("stu-1").is_none());
        assert!(store.payment("order_1").is_none());
    }

    #[tokio::test]
    async fn unknown_account_is_none() {
        let store = seeded();
        assert!(remove_account(&store, "ghost").await.unwrap().is_none());
        assert!(store.subscription("stu-1").is_some());
    }

    #[tokio::test]
    async fn interrupted_deletion_can_be_retried() {
        let store = seeded();
        store.fail_deletion_after(1);

        let err = remove_account(&store, "stu-1").await.unwrap_err();
        assert!(matches!(err, CoreError::Transient { .. }));
        // Payments are gone, the account is still there to retry against.
        assert!(store.payment("order_1").is_none());
        assert!(store.get_account("stu-1").await.unwrap().is_some());

        let removed = remove_account(&store, "stu-1").await.unwrap();
        assert!(removed.is_some());
        assert!(store.subscription("stu-1").is_none());
        assert!(store.get_account("stu-1").await.unwrap().is_none());
    }
}
