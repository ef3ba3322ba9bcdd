use actix_web::{web, HttpResponse};
use sqlx::PgPool;

/// GET /health: liveness plus a database ping
pub async fn health_check(pool: web::Data<PgPool>) -> HttpResponse {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool.get_ref())
        .await
    {
        Ok(_) => "up",
        Err(e) => {
            tracing::error!(error = %e, "Health check database ping failed");
            "down"
        }
    };

    let healthy = database == "up";
    let body = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "meterbill",
        "database": database,
    });

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Configure health routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
