use actix_files as files;
use actix_session::CookieSession;
use actix_web::cookie::SameSite;
use actix_web::http::StatusCode;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use tera::{Context, Tera};
use tracing::info;
use tracing_subscriber::EnvFilter;
//modules
mod config;
mod error;
mod storage;
mod supabase;

use crate::config::Config;
use crate::error::AppResult;
use crate::storage::service::StorageService;
use crate::supabase::SupabaseClient;

pub fn render(
    tera: &Tera,
    template: &str,
    context: &Context,
    status: StatusCode,
) -> AppResult<HttpResponse> {
    let rendered = tera.render(template, context)?;
    Ok(HttpResponse::build(status)
        .content_type("text/html")
        .body(rendered))
}

async fn home(tera: web::Data<Tera>) -> AppResult<HttpResponse> {
    let mut context = Context::new();
    context.insert("title", "Cloud Storage");
    render(&tera, "home.html", &context, StatusCode::OK)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok(); // Load .env file if available
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let client = Arc::new(SupabaseClient::new(
        &config.supabase.url,
        &config.supabase.anon_key,
        &config.supabase.bucket,
        config.supabase.timeout,
    )?);
    let service = web::Data::new(StorageService::new(
        client.clone(),
        client,
        &config.supabase,
    ));
    let upload = web::Data::new(config.upload.clone());
    let tera = Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))?;
    let session_key = config.server.session_key.clone();

    info!(
        "Server {}:{} using bucket {:?}",
        config.server.host, config.server.port, config.supabase.bucket
    );
    HttpServer::new(move || {
        App::new()
            .wrap(CookieSession::signed(&session_key)
                    .secure(false) // Set to true in production over HTTPS
                    .same_site(SameSite::Strict)
                    .max_age(24 * 60 * 60),)
            .wrap(Logger::default())
            .app_data(service.clone())
            .app_data(upload.clone())
            .app_data(web::Data::new(tera.clone()))
            .route("/", web::get().to(home))
            .configure(storage::routes::config)
            .service(files::Files::new("/static", concat!(env!("CARGO_MANIFEST_DIR"), "/static")))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn landing_links_to_storage() {
        let tera = Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(tera))
                .route("/", web::get().to(home)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(html.contains("A simple cloud storage web application"));
        assert!(html.contains(r#"href="/storage""#));
    }
}
