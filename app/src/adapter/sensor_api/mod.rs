use actix_web::{HttpResponse, ResponseError, web};
use derive_more::derive::{Display, Error};

use crate::sensor::SensorStore;

pub fn new_routes(store: SensorStore) -> actix_web::Scope {
    web::scope("/api/sensors")
        .route("", web::get().to(get_sensors))
        .route("/{unique_id}", web::get().to(get_sensor))
        .app_data(web::Data::new(store))
}

type SensorApiResponse = Result<HttpResponse, SensorApiError>;

#[derive(Debug, Error, Display)]
enum SensorApiError {
    #[display("Sensor {unique_id} not found")]
    NotFound { unique_id: String },
}

impl ResponseError for SensorApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        tracing::warn!("SensorApiError: {:?}", self);

        match self {
            SensorApiError::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }
}

async fn get_sensors(store: web::Data<SensorStore>) -> SensorApiResponse {
    Ok(HttpResponse::Ok().json(store.all().await))
}

async fn get_sensor(store: web::Data<SensorStore>, path: web::Path<String>) -> SensorApiResponse {
    let unique_id = path.into_inner();

    match store.get(&unique_id).await {
        Some(report) => Ok(HttpResponse::Ok().json(report)),
        None => Err(SensorApiError::NotFound { unique_id }),
    }
}
