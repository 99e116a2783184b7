//! Server-side procedures over the table store
//!
//! Identifier generation, role assignment and balance updates. Each one is a
//! short sequence of store calls; anything that mutates money commits with a
//! balance precondition.

use super::{fetch, select, Collection, Query, TableStore, WriteBatch};
use crate::access::roles::{Role, RoleAssignment};
use crate::errors::{BingoResult, StorageError, ValidationError};
use crate::wallet::types::{AgentProfile, Amount, TransactionType};
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

const CARD_NUMBER_ATTEMPTS: usize = 16;
const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `C-YYYYMMDD-XXXXXX` with an upper-case hex suffix
pub fn card_number_candidate<R: Rng + ?Sized>(rng: &mut R, date: NaiveDate) -> String {
    let suffix: [u8; 3] = rng.gen();
    format!(
        "C-{}-{}",
        date.format("%Y%m%d"),
        hex::encode_upper(suffix)
    )
}

/// Unique card number for `date`, retrying on collision
pub async fn generate_card_number<R: Rng + Send + ?Sized>(
    store: &dyn TableStore,
    rng: &mut R,
    date: NaiveDate,
) -> BingoResult<String> {
    for _ in 0..CARD_NUMBER_ATTEMPTS {
        let candidate = card_number_candidate(rng, date);
        if store.get(Collection::CardNumbers, &candidate).await?.is_none() {
            return Ok(candidate);
        }
        debug!("Card number {} already issued, retrying", candidate);
    }

    Err(StorageError::WriteFailed(format!(
        "could not allocate a unique card number for {} after {} attempts",
        date, CARD_NUMBER_ATTEMPTS
    ))
    .into())
}

/// `TXN-<unix millis>-<9 base36 chars>`
pub fn generate_transaction_id<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> String {
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("TXN-{}-{}", now.timestamp_millis(), suffix)
}

/// Fresh active role row
pub fn role_row(user_id: &str, role: Role, assigned_by: &str) -> RoleAssignment {
    let now = Utc::now();
    RoleAssignment {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        role,
        is_active: true,
        assigned_by: Some(assigned_by.to_string()),
        assigned_at: now,
        updated_at: now,
    }
}

/// Grant `role` to `user_id`. Returns false if an active row already existed;
/// an inactive duplicate is re-activated instead of inserting a second row.
pub async fn assign_user_role(
    store: &dyn TableStore,
    user_id: &str,
    role: Role,
    assigned_by: &str,
) -> BingoResult<bool> {
    let existing: Vec<RoleAssignment> = select(
        store,
        &Query::of::<RoleAssignment>()
            .eq("user_id", user_id)
            .eq("role", role),
    )
    .await?;

    if existing.iter().any(|r| r.is_active) {
        return Ok(false);
    }

    let now = Utc::now();
    let row = match existing.into_iter().next() {
        Some(mut row) => {
            row.is_active = true;
            row.assigned_by = Some(assigned_by.to_string());
            row.assigned_at = now;
            row.updated_at = now;
            row
        }
        None => role_row(user_id, role, assigned_by),
    };

    let mut batch = WriteBatch::new();
    batch.put(&row)?;
    store.commit(batch).await?;

    info!(user_id, role = %role, assigned_by, "Role assigned");
    Ok(true)
}

async fn active_roles(store: &dyn TableStore, user_id: &str) -> BingoResult<Vec<RoleAssignment>> {
    select(
        store,
        &Query::of::<RoleAssignment>()
            .eq("user_id", user_id)
            .eq("is_active", true),
    )
    .await
}

/// Any active admin or super_admin row
pub async fn has_admin_role(store: &dyn TableStore, user_id: &str) -> BingoResult<bool> {
    Ok(active_roles(store, user_id)
        .await?
        .iter()
        .any(|r| matches!(r.role, Role::Admin | Role::SuperAdmin)))
}

/// Any active role row at all
pub async fn is_admin_user(store: &dyn TableStore, user_id: &str) -> BingoResult<bool> {
    Ok(!active_roles(store, user_id).await?.is_empty())
}

/// Balance after applying `amount` of `kind`; never negative
pub fn balance_after(
    balance: Amount,
    amount: Amount,
    kind: TransactionType,
) -> Result<Amount, ValidationError> {
    let next = if kind.credits_balance() {
        balance.checked_add(amount)
    } else {
        balance.checked_sub(amount)
    };

    match next {
        Some(value) if !value.is_negative() => Ok(value),
        _ => Err(ValidationError::InsufficientBalance {
            requested: amount.to_string(),
            available: balance.to_string(),
        }),
    }
}

/// Return the stored agent profile, inserting `fresh` only if no row exists.
/// A concurrent insert wins; its row is read back instead of being overwritten.
pub async fn ensure_agent_profile(
    store: &dyn TableStore,
    fresh: AgentProfile,
) -> BingoResult<(AgentProfile, bool)> {
    if let Some(profile) = fetch::<AgentProfile>(store, &fresh.id).await? {
        return Ok((profile, false));
    }

    let mut batch = WriteBatch::new();
    batch.put(&fresh)?;
    batch.expect_absent(Collection::Agents, &fresh.id);
    match store.commit(batch).await {
        Ok(()) => Ok((fresh, true)),
        Err(StorageError::Conflict { .. }) => {
            debug!(user_id = %fresh.id, "Agent profile created concurrently");
            fetch::<AgentProfile>(store, &fresh.id)
                .await?
                .map(|profile| (profile, false))
                .ok_or_else(|| {
                    StorageError::ReadFailed(format!("agent profile {} vanished", fresh.id)).into()
                })
        }
        Err(e) => Err(e.into()),
    }
}

/// Apply a balance change to the user's agent profile, creating it when absent
pub async fn update_user_balance(
    store: &dyn TableStore,
    user_id: &str,
    amount: Amount,
    kind: TransactionType,
    currency: &str,
) -> BingoResult<Amount> {
    let existing = fetch::<AgentProfile>(store, user_id).await?;
    let mut batch = WriteBatch::new();

    let mut profile = match existing {
        Some(profile) => {
            batch.expect(Collection::Agents, user_id, "balance", profile.balance);
            profile
        }
        None => {
            batch.expect_absent(Collection::Agents, user_id);
            AgentProfile::new(user_id, currency)
        }
    };

    profile.balance = balance_after(profile.balance, amount, kind)?;
    profile.updated_at = Utc::now();
    batch.put(&profile)?;
    store.commit(batch).await?;

    debug!(user_id, balance = %profile.balance, "Balance updated");
    Ok(profile.balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_card_number_format() {
        let mut rng = StdRng::seed_from_u64(1);
        let date = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        let number = card_number_candidate(&mut rng, date);

        assert!(number.starts_with("C-20250614-"));
        let suffix = &number["C-20250614-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_transaction_id_format() {
        let mut rng = StdRng::seed_from_u64(2);
        let now = Utc::now();
        let id = generate_transaction_id(&mut rng, now);
        let parts: Vec<&str> = id.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TXN");
        assert_eq!(parts[1], now.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_assign_user_role_is_idempotent() {
        let store = MemoryStore::new();

        assert!(assign_user_role(&store, "u1", Role::Cashier, "admin-1").await.unwrap());
        assert!(!assign_user_role(&store, "u1", Role::Cashier, "admin-1").await.unwrap());
        assert!(is_admin_user(&store, "u1").await.unwrap());
        assert!(!has_admin_role(&store, "u1").await.unwrap());

        assert!(assign_user_role(&store, "u1", Role::Admin, "admin-1").await.unwrap());
        assert!(has_admin_role(&store, "u1").await.unwrap());
        assert_eq!(store.scan(Collection::UserRoles).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_agent_profile_keeps_existing_row() {
        let store = MemoryStore::new();
        let (created, inserted) = ensure_agent_profile(&store, AgentProfile::new("u1", "ETB"))
            .await
            .unwrap();
        assert!(inserted);
        assert_eq!(created.balance, Amount::ZERO);

        update_user_balance(&store, "u1", Amount::from_major(40), TransactionType::Deposit, "ETB")
            .await
            .unwrap();

        let (profile, inserted) = ensure_agent_profile(&store, AgentProfile::new("u1", "ETB"))
            .await
            .unwrap();
        assert!(!inserted);
        assert_eq!(profile.balance, Amount::from_major(40));
    }

    #[tokio::test]
    async fn test_update_user_balance_refuses_negative() {
        let store = MemoryStore::new();
        let balance = update_user_balance(
            &store,
            "u1",
            Amount::from_major(100),
            TransactionType::Deposit,
            "ETB",
        )
        .await
        .unwrap();
        assert_eq!(balance, Amount::from_major(100));

        let err = update_user_balance(
            &store,
            "u1",
            Amount::from_cents(10_001),
            TransactionType::Withdrawal,
            "ETB",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, crate::errors::BingoError::Validation(_)));

        let profile = fetch::<AgentProfile>(&store, "u1").await.unwrap().unwrap();
        assert_eq!(profile.balance, Amount::from_major(100));
    }
}
