//! Staff and agent accounts (`user_accounts`)
//!
//! What a create request must carry depends on the user type; that is
//! looked up once from [`UserType::form`] instead of branching per field.

use super::audit::AdminAction;
use crate::access::roles::{AccessContext, Role};
use crate::errors::{BingoError, BingoResult, ValidationError};
use crate::identity::{IdentityProvider, SignUpRequest};
use crate::store::{
    fetch, procedures, select, Collection, Order, Query, Record, SharedStore, WriteBatch,
};
use crate::wallet::types::{AgentProfile, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    SuperAdmin,
    Admin,
    SuperAgent,
    Shop,
    Agent,
    Cashier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    FullName,
    PhoneNumber,
    Password,
    AssignedSuperAgent,
}

/// Per-type create form
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccountForm {
    pub required_fields: &'static [FormField],
    pub role_to_assign: Option<Role>,
    pub requires_super_agent: bool,
    /// Minimum role allowed to create this type
    pub creator_role: Role,
}

const BASE_FIELDS: &[FormField] = &[FormField::FullName, FormField::PhoneNumber, FormField::Password];
const AGENT_FIELDS: &[FormField] = &[
    FormField::FullName,
    FormField::PhoneNumber,
    FormField::Password,
    FormField::AssignedSuperAgent,
];

impl UserType {
    pub const ALL: [UserType; 6] = [
        UserType::SuperAdmin,
        UserType::Admin,
        UserType::SuperAgent,
        UserType::Shop,
        UserType::Agent,
        UserType::Cashier,
    ];

    pub fn form(&self) -> AccountForm {
        match self {
            UserType::SuperAdmin => AccountForm {
                required_fields: BASE_FIELDS,
                role_to_assign: Some(Role::SuperAdmin),
                requires_super_agent: false,
                creator_role: Role::SuperAdmin,
            },
            UserType::Admin => AccountForm {
                required_fields: BASE_FIELDS,
                role_to_assign: Some(Role::Admin),
                requires_super_agent: false,
                creator_role: Role::SuperAdmin,
            },
            UserType::Cashier => AccountForm {
                required_fields: BASE_FIELDS,
                role_to_assign: Some(Role::Cashier),
                requires_super_agent: false,
                creator_role: Role::Admin,
            },
            UserType::SuperAgent => AccountForm {
                required_fields: BASE_FIELDS,
                role_to_assign: None,
                requires_super_agent: false,
                creator_role: Role::Admin,
            },
            UserType::Shop | UserType::Agent => AccountForm {
                required_fields: AGENT_FIELDS,
                role_to_assign: None,
                requires_super_agent: true,
                creator_role: Role::Admin,
            },
        }
    }
}

/// Row of `user_accounts`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAccount {
    pub id: String,
    pub user_id: String,
    pub user_type: UserType,
    pub assigned_super_agent: Option<String>,
    pub balance: Amount,
    pub is_active: bool,
    pub total_cartelas_handled: u32,
    pub total_transactions: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for UserAccount {
    const COLLECTION: Collection = Collection::UserAccounts;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub user_type: UserType,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub assigned_super_agent: Option<String>,
    #[serde(default)]
    pub initial_balance: Amount,
}

impl NewAccount {
    fn field(&self, field: FormField) -> Option<&str> {
        let value = match field {
            FormField::FullName => self.full_name.as_deref(),
            FormField::PhoneNumber => self.phone_number.as_deref(),
            FormField::Password => self.password.as_deref(),
            FormField::AssignedSuperAgent => self.assigned_super_agent.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Account joined with its agent profile
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: UserAccount,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
}

pub struct AccountManager {
    store: SharedStore,
    identity: Arc<dyn IdentityProvider>,
    currency: String,
}

impl AccountManager {
    pub fn new(store: SharedStore, identity: Arc<dyn IdentityProvider>, currency: impl Into<String>) -> Self {
        Self {
            store,
            identity,
            currency: currency.into(),
        }
    }

    pub async fn create(&self, ctx: &AccessContext, request: NewAccount) -> BingoResult<AccountView> {
        let form = request.user_type.form();
        ctx.require_at_least(form.creator_role)?;

        for field in form.required_fields {
            if request.field(*field).is_none() {
                let name = serde_json::to_value(field)?
                    .as_str()
                    .unwrap_or("field")
                    .to_string();
                return Err(ValidationError::MissingField(name).into());
            }
        }
        if request.initial_balance.is_negative() {
            return Err(ValidationError::invalid("initial_balance", "must not be negative").into());
        }

        let super_agent = if form.requires_super_agent {
            let id = request
                .field(FormField::AssignedSuperAgent)
                .unwrap_or_default()
                .to_string();
            let parent: Option<UserAccount> = select(
                self.store.as_ref(),
                &Query::of::<UserAccount>()
                    .eq("user_id", &id)
                    .eq("user_type", UserType::SuperAgent)
                    .eq("is_active", true),
            )
            .await?
            .pop();
            if parent.is_none() {
                return Err(ValidationError::invalid(
                    "assigned_super_agent",
                    "must reference an active super agent",
                )
                .into());
            }
            Some(id)
        } else {
            None
        };

        let full_name = request.field(FormField::FullName).map(str::to_string);
        let identity = self
            .identity
            .create_user(SignUpRequest {
                phone_number: request.field(FormField::PhoneNumber).unwrap_or_default().to_string(),
                password: request.password.clone().unwrap_or_default(),
                full_name: full_name.clone(),
            })
            .await?;

        let now = Utc::now();
        let account = UserAccount {
            id: Uuid::new_v4().to_string(),
            user_id: identity.user_id.clone(),
            user_type: request.user_type,
            assigned_super_agent: super_agent,
            balance: request.initial_balance,
            is_active: true,
            total_cartelas_handled: 0,
            total_transactions: 0,
            created_at: now,
            updated_at: now,
        };

        let mut profile = AgentProfile::new(&identity.user_id, &self.currency);
        profile.full_name = full_name.clone();
        profile.phone_number = Some(identity.phone_number.clone());
        profile.balance = request.initial_balance;

        let action = AdminAction::new(
            ctx,
            "create_account",
            format!("Created {:?} account for {}", request.user_type, identity.phone_number),
        )
        .target(Collection::UserAccounts, &account.id);

        let written = async {
            let mut batch = WriteBatch::new();
            batch.put(&account)?.put(&profile)?.put(&action)?;
            batch.expect_absent(Collection::Agents, &identity.user_id);
            if let Some(role) = form.role_to_assign {
                batch.put(&procedures::role_row(&identity.user_id, role, ctx.user_id()))?;
            }
            self.store.commit(batch).await
        }
        .await;

        if let Err(e) = written {
            warn!(user_id = %identity.user_id, "Account rows not written, removing identity: {}", e);
            if let Err(undo) = self.identity.remove_user(&identity.phone_number).await {
                error!(user_id = %identity.user_id, "Could not remove orphaned identity: {}", undo);
            }
            return Err(e.into());
        }

        info!(user_id = %identity.user_id, "👤 Created {:?} account", request.user_type);
        Ok(AccountView {
            account,
            full_name,
            phone_number: Some(identity.phone_number),
        })
    }

    async fn join_profile(&self, account: UserAccount) -> BingoResult<AccountView> {
        let profile = fetch::<AgentProfile>(self.store.as_ref(), &account.user_id).await?;
        Ok(AccountView {
            full_name: profile.as_ref().and_then(|p| p.full_name.clone()),
            phone_number: profile.and_then(|p| p.phone_number),
            account,
        })
    }

    /// Accounts of one type, newest first; `search` matches name or phone
    pub async fn list(
        &self,
        ctx: &AccessContext,
        user_type: UserType,
        search: Option<&str>,
    ) -> BingoResult<Vec<AccountView>> {
        ctx.require_at_least(Role::Admin)?;
        let accounts: Vec<UserAccount> = select(
            self.store.as_ref(),
            &Query::of::<UserAccount>()
                .eq("user_type", user_type)
                .order_by("created_at", Order::Desc),
        )
        .await?;

        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let mut views = Vec::with_capacity(accounts.len());
        for account in accounts {
            let view = self.join_profile(account).await?;
            let keep = match &needle {
                None => true,
                Some(n) => [&view.full_name, &view.phone_number]
                    .iter()
                    .filter_map(|v| v.as_deref())
                    .any(|v| v.to_lowercase().contains(n.as_str())),
            };
            if keep {
                views.push(view);
            }
        }
        Ok(views)
    }

    pub async fn list_super_agents(&self, ctx: &AccessContext) -> BingoResult<Vec<AccountView>> {
        Ok(self
            .list(ctx, UserType::SuperAgent, None)
            .await?
            .into_iter()
            .filter(|v| v.account.is_active)
            .collect())
    }

    pub async fn get(&self, ctx: &AccessContext, id: &str) -> BingoResult<AccountView> {
        ctx.require_at_least(Role::Admin)?;
        let account = fetch::<UserAccount>(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| BingoError::not_found(format!("account {} not found", id)))?;
        self.join_profile(account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::roles::RoleGrant;
    use crate::config::IdentityConfig;
    use crate::errors::StorageError;
    use crate::identity::{Identity, LocalIdentityProvider};
    use crate::store::{MemoryStore, TableStore};
    use async_trait::async_trait;
    use serde_json::Value;

    fn ctx(role: Role) -> AccessContext {
        AccessContext::new(
            Identity {
                user_id: "root".to_string(),
                phone_number: "+251911000000".to_string(),
                full_name: None,
            },
            Some(RoleGrant::assigned(role)),
        )
    }

    fn manager() -> (AccountManager, SharedStore) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let identity = LocalIdentityProvider::new(store.clone(), IdentityConfig::default());
        let manager = AccountManager::new(store.clone(), Arc::new(identity), "ETB");
        (manager, store)
    }

    fn new_account(user_type: UserType, phone: &str) -> NewAccount {
        NewAccount {
            user_type,
            full_name: Some("Hana Girma".to_string()),
            phone_number: Some(phone.to_string()),
            password: Some("secret1".to_string()),
            assigned_super_agent: None,
            initial_balance: Amount::from_major(250),
        }
    }

    #[test]
    fn test_form_table() {
        assert_eq!(UserType::Cashier.form().role_to_assign, Some(Role::Cashier));
        assert!(UserType::Agent.form().requires_super_agent);
        assert!(UserType::Agent
            .form()
            .required_fields
            .contains(&FormField::AssignedSuperAgent));
        assert_eq!(UserType::Admin.form().creator_role, Role::SuperAdmin);
        assert!(UserType::SuperAgent.form().role_to_assign.is_none());
    }

    #[tokio::test]
    async fn test_create_cashier_assigns_role_and_profile() {
        let (manager, store) = manager();
        let view = manager
            .create(&ctx(Role::Admin), new_account(UserType::Cashier, "+251944000001"))
            .await
            .unwrap();

        assert!(procedures::is_admin_user(store.as_ref(), &view.account.user_id).await.unwrap());
        let profile = fetch::<AgentProfile>(store.as_ref(), &view.account.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.balance, Amount::from_major(250));
    }

    #[tokio::test]
    async fn test_admin_cannot_create_admin() {
        let (manager, _) = manager();
        assert!(manager
            .create(&ctx(Role::Admin), new_account(UserType::Admin, "+251944000002"))
            .await
            .is_err());
        assert!(manager
            .create(&ctx(Role::SuperAdmin), new_account(UserType::Admin, "+251944000002"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_agent_requires_active_super_agent() {
        let (manager, _) = manager();
        let admin = ctx(Role::Admin);

        let mut agent = new_account(UserType::Agent, "+251944000003");
        assert!(matches!(
            manager.create(&admin, agent.clone()).await,
            Err(BingoError::Validation(ValidationError::MissingField(_)))
        ));

        agent.assigned_super_agent = Some("nobody".to_string());
        assert!(manager.create(&admin, agent.clone()).await.is_err());

        let parent = manager
            .create(&admin, new_account(UserType::SuperAgent, "+251944000004"))
            .await
            .unwrap();
        agent.assigned_super_agent = Some(parent.account.user_id.clone());
        let created = manager.create(&admin, agent).await.unwrap();
        assert_eq!(
            created.account.assigned_super_agent.as_deref(),
            Some(parent.account.user_id.as_str())
        );

        assert_eq!(manager.list_super_agents(&admin).await.unwrap().len(), 1);
        let found = manager
            .list(&admin, UserType::Agent, Some("hana"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    /// Fails every batch that writes a user account row
    struct RejectAccounts(MemoryStore);

    #[async_trait]
    impl TableStore for RejectAccounts {
        async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError> {
            self.0.get(collection, id).await
        }

        async fn scan(&self, collection: Collection) -> Result<Vec<Value>, StorageError> {
            self.0.scan(collection).await
        }

        async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
            let writes_account = batch.ops.iter().any(|op| {
                matches!(op, crate::store::WriteOp::Put { collection: Collection::UserAccounts, .. })
            });
            if writes_account {
                return Err(StorageError::WriteFailed("disk full".to_string()));
            }
            self.0.commit(batch).await
        }
    }

    #[tokio::test]
    async fn test_failed_commit_removes_identity() {
        let store: SharedStore = Arc::new(RejectAccounts(MemoryStore::new()));
        let identity = Arc::new(LocalIdentityProvider::new(store.clone(), IdentityConfig::default()));
        let manager = AccountManager::new(store.clone(), identity.clone(), "ETB");

        let err = manager
            .create(&ctx(Role::Admin), new_account(UserType::Cashier, "+251944000009"))
            .await
            .unwrap_err();
        assert!(matches!(err, BingoError::Backend(StorageError::WriteFailed(_))));

        // nothing half-written: no identity, profile or role survives
        assert!(store.scan(Collection::Identities).await.unwrap().is_empty());
        assert!(store.scan(Collection::Agents).await.unwrap().is_empty());
        assert!(store.scan(Collection::UserRoles).await.unwrap().is_empty());

        // the phone number is free for a retry
        identity
            .sign_up(SignUpRequest {
                phone_number: "+251944000009".to_string(),
                password: "secret1".to_string(),
                full_name: None,
            })
            .await
            .unwrap();
    }
}
