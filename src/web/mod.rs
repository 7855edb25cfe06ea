use axum::{http::Method, routing::get, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;
use crate::dispatch::DispatchEngine;
use crate::session::SessionStore;

pub mod error;
pub mod routes;

pub use error::AppError;

pub struct AppState {
    pub db_pool: Arc<DatabaseConnection>,
    pub engine: Arc<DispatchEngine>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(
    db_pool: Arc<DatabaseConnection>,
    engine: Arc<DispatchEngine>,
    sessions: Arc<dyn SessionStore>,
    config: Arc<ServerConfig>,
) -> Router {
    let app_state = Arc::new(AppState {
        db_pool,
        engine,
        sessions,
        config,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest(
            "/api/templates",
            routes::template_routes::create_templates_router(),
        )
        .nest(
            "/api/notifications",
            routes::notification_routes::create_notifications_router(),
        )
        .nest(
            "/api/dispatch",
            routes::dispatch_routes::create_dispatch_router(),
        )
        .with_state(app_state)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DispatchSettings, EmailSettings};
    use crate::notifications::models::{DeliveryOutcome, OutgoingMessage, RecipientAddress};
    use crate::notifications::senders::{ChannelSender, SenderError};
    use crate::session::MemorySessionStore;
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase};

    struct NullSender;

    #[async_trait]
    impl ChannelSender for NullSender {
        async fn send(
            &self,
            _message: &OutgoingMessage,
            recipients: &[RecipientAddress],
        ) -> Result<Vec<DeliveryOutcome>, SenderError> {
            Ok(recipients.iter().map(DeliveryOutcome::ok).collect())
        }
    }

    fn config() -> ServerConfig {
        ServerConfig {
            listen_addr: "127.0.0.1:0".to_owned(),
            database_url: "postgres://localhost/eventos".to_owned(),
            dispatch: DispatchSettings {
                interval_seconds: 300,
                max_retries: 3,
                item_delay_ms: 0,
                lease_seconds: 600,
            },
            email: EmailSettings {
                smtp_host: "localhost".to_owned(),
                smtp_port: 587,
                smtp_user: None,
                smtp_password: None,
                from_address: "noreply@example.com".to_owned(),
                batch_size: 50,
                fallback: None,
            },
            push: None,
        }
    }

    // The connection is shared behind an Arc, so the state assembles even
    // with a mock connection, which is not clonable.
    #[test]
    fn router_assembles_with_a_mock_connection() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let sender: Arc<dyn ChannelSender> = Arc::new(NullSender);
        let engine = Arc::new(DispatchEngine::new(
            db.clone(),
            sender.clone(),
            sender,
            config().dispatch,
        ));
        let _router = create_axum_router(
            db,
            engine,
            Arc::new(MemorySessionStore::new()),
            Arc::new(config()),
        );
    }
}
