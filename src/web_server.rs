use actix_web::{web, App, HttpResponse, HttpServer};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::MillError;
use crate::image::{BatchAttachment, ImageItem, SearchParam, SyncOperation};
use crate::mill::ImageMill;

#[derive(Deserialize, Debug)]
struct BatchRequest {
    images: Vec<ImageItem>,
    attachment: BatchAttachment,
}

async fn sync_images(
    mill: web::Data<ImageMill>,
    request: web::Json<BatchRequest>,
    operation: SyncOperation,
) -> Result<HttpResponse, MillError> {
    let request = request.into_inner();
    log::debug!(
        "Received {} request for {} images on instance '{}'",
        operation,
        request.images.len(),
        request.attachment.instance_name
    );
    let report = mill
        .sync_images(&request.images, &request.attachment, operation)
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

async fn add_images(
    mill: web::Data<ImageMill>,
    request: web::Json<BatchRequest>,
) -> Result<HttpResponse, MillError> {
    sync_images(mill, request, SyncOperation::Add).await
}

async fn delete_images(
    mill: web::Data<ImageMill>,
    request: web::Json<BatchRequest>,
) -> Result<HttpResponse, MillError> {
    sync_images(mill, request, SyncOperation::Delete).await
}

async fn search_image(
    mill: web::Data<ImageMill>,
    param: web::Json<SearchParam>,
) -> Result<HttpResponse, MillError> {
    log::debug!("Received search request: {:?}", param);
    let result = mill.search_image(&param).await?;
    Ok(HttpResponse::Ok().json(result))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/images").route(web::post().to(add_images)))
        .service(web::resource("/api/images/delete").route(web::post().to(delete_images)))
        .service(web::resource("/api/search").route(web::post().to(search_image)));
}

pub async fn start_web_server(config: Arc<AppConfig>, mill: Arc<ImageMill>) -> std::io::Result<()> {
    let port = config.web_port;
    let mill_data = web::Data::from(mill);

    log::info!("Starting web server on port: {}", port);

    HttpServer::new(move || App::new().app_data(mill_data.clone()).configure(configure))
        .bind(format!("0.0.0.0:{}", port))?
        .run()
        .await
}
