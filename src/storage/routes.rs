use actix_web::web;
use crate::storage::handlers;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(
            web::resource("/storage")
                .route(web::get().to(handlers::storage_get)),
        )
        .service(
            web::resource("/storage/files")
                .route(web::post().to(handlers::upload_file_post)),
        )
        .service(
            web::resource("/storage/profile")
                .route(web::post().to(handlers::upload_profile_post)),
        );
}
