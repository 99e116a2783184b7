//! Route Definitions
//!
//! Maps URLs to handlers with type-safe routing.
//!
//! | Area   | Auth                 | Paths                                   |
//! |--------|----------------------|-----------------------------------------|
//! | system | none                 | `/health`, `/metrics`                   |
//! | auth   | bearer for me/out    | `/auth/*`                               |
//! | game   | none                 | `/games`, `/games/:id/*`                |
//! | wallet | bearer               | `/wallet/*`                             |
//! | public | none                 | `/cartelas/:card_number/verify`         |
//! | admin  | bearer + role        | `/admin/*`                              |

use super::handlers::{admin, auth, game, health_handler, metrics_handler, wallet, AppState};
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Identity
        .route("/auth/sign-up", post(auth::sign_up_handler))
        .route("/auth/sign-in", post(auth::sign_in_handler))
        .route("/auth/sign-out", post(auth::sign_out_handler))
        .route("/auth/password-reset", post(auth::reset_password_handler))
        .route(
            "/auth/password-reset/complete",
            post(auth::complete_reset_handler),
        )
        .route("/auth/me", get(auth::me_handler))
        // Free-play game
        .route("/games", post(game::create_session_handler))
        .route(
            "/games/:session_id",
            get(game::get_session_handler).delete(game::end_session_handler),
        )
        .route("/games/:session_id/start", post(game::start_handler))
        .route("/games/:session_id/call", post(game::call_handler))
        .route("/games/:session_id/marks", post(game::toggle_mark_handler))
        .route("/games/:session_id/reset", post(game::reset_handler))
        .route("/games/:session_id/card", post(game::new_card_handler))
        .route("/games/:session_id/events", get(game::events_handler))
        // Wallet
        .route("/wallet/balance", get(wallet::balance_handler))
        .route("/wallet/payment-methods", get(wallet::payment_methods_handler))
        .route("/wallet/deposits", post(wallet::deposit_handler))
        .route("/wallet/withdrawals", post(wallet::withdrawal_handler))
        .route("/wallet/transactions", get(wallet::history_handler))
        .route(
            "/wallet/transactions/:transaction_id/confirm",
            post(wallet::confirm_handler),
        )
        .route(
            "/wallet/transactions/:transaction_id/cancel",
            post(wallet::cancel_handler),
        )
        // Public card check
        .route(
            "/cartelas/:card_number/verify",
            get(admin::verify_cartela_handler),
        )
        // Staff dashboard
        .route("/admin/dashboard", get(admin::dashboard_handler))
        .route("/admin/stats", get(admin::stats_handler))
        .route(
            "/admin/cartelas",
            get(admin::list_cartelas_handler).post(admin::issue_cartela_handler),
        )
        .route("/admin/cartelas/bulk", post(admin::generate_cartelas_handler))
        .route(
            "/admin/groups",
            get(admin::list_groups_handler).post(admin::create_group_handler),
        )
        .route("/admin/groups/:group_id", get(admin::get_group_handler))
        .route(
            "/admin/results",
            get(admin::list_results_handler).post(admin::create_result_handler),
        )
        .route(
            "/admin/results/:result_id/publish",
            post(admin::publish_result_handler),
        )
        .route(
            "/admin/results/:result_id/complete",
            post(admin::complete_result_handler),
        )
        .route(
            "/admin/credits",
            get(admin::list_credits_handler).post(admin::record_credit_handler),
        )
        .route(
            "/admin/credits/:credit_id/acknowledge",
            post(admin::acknowledge_credit_handler),
        )
        .route("/admin/account-forms", get(admin::account_forms_handler))
        .route(
            "/admin/accounts",
            get(admin::list_accounts_handler).post(admin::create_account_handler),
        )
        .route("/admin/accounts/:account_id", get(admin::get_account_handler))
        .route("/admin/super-agents", get(admin::super_agents_handler))
        .route("/admin/roles", post(admin::assign_role_handler))
        .route(
            "/admin/roles/:assignment_id",
            delete(admin::deactivate_role_handler),
        )
        .route("/admin/users/:user_id/roles", get(admin::list_roles_handler))
        .route("/admin/audit", get(admin::audit_log_handler))
        .with_state(state)
}
