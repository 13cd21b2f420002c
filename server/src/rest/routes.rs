//! Route-Definitionen fuer die REST-API (/v1/...)

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::rest::handlers;
use crate::state::AppState;

/// Erstellt den vollstaendigen /v1/-Router
pub fn v1_router() -> Router<AppState> {
    Router::new()
        // Secret-Chats
        .route(
            "/v1/secret-chats",
            get(handlers::secret_chats::list_secret_chats)
                .post(handlers::secret_chats::create_secret_chat),
        )
        .route(
            "/v1/secret-chats/:id",
            get(handlers::secret_chats::get_secret_chat)
                .delete(handlers::secret_chats::delete_secret_chat),
        )
        .route("/v1/secret-chats/:id/public-key", put(handlers::secret_chats::put_public_key))
        .route("/v1/secret-chats/:id/symmetric-key", put(handlers::secret_chats::put_symmetric_key))
        .route("/v1/secret-chats/:id/approve", post(handlers::secret_chats::approve_secret_chat))
        .route("/v1/secret-chats/:id/messages", get(handlers::secret_chats::list_messages))
        // Secret-Groups
        .route(
            "/v1/secret-groups",
            get(handlers::secret_groups::list_groups).post(handlers::secret_groups::create_group),
        )
        .route("/v1/secret-groups/join/:invite_link", post(handlers::secret_groups::join_group))
        .route(
            "/v1/secret-groups/:id",
            get(handlers::secret_groups::get_group).delete(handlers::secret_groups::delete_group),
        )
        .route("/v1/secret-groups/:id/leave", post(handlers::secret_groups::leave_group))
        .route(
            "/v1/secret-groups/:id/members",
            get(handlers::secret_groups::list_members),
        )
        .route(
            "/v1/secret-groups/:id/members/:user_id",
            delete(handlers::secret_groups::remove_member),
        )
        .route("/v1/secret-groups/:id/ban", post(handlers::secret_groups::ban_member))
        .route("/v1/secret-groups/:id/unban", post(handlers::secret_groups::unban_member))
        .route("/v1/secret-groups/:id/messages", get(handlers::secret_groups::list_messages))
        // Regulaerer Verlauf
        .route("/v1/chats/:id/messages", get(handlers::nachrichten::list_chat_messages))
        .route("/v1/groups/:id/messages", get(handlers::nachrichten::list_group_messages))
        .route("/v1/messages/:id", put(handlers::nachrichten::update_message))
        .route("/v1/messages/:id/sender", delete(handlers::nachrichten::delete_for_sender))
        .route("/v1/messages/:id/receiver", delete(handlers::nachrichten::delete_for_receiver))
        .route("/v1/messages/:id/all", delete(handlers::nachrichten::delete_for_all))
        // Hub
        .route("/v1/hub/stats", get(handlers::hub::get_stats))
        .route("/v1/hub/capacity", get(handlers::hub::get_capacity))
}
