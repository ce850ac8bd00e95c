//! Integration tests for LabelDataService
//!
//! Tests cover:
//! - Production line listing and lookup
//! - Serial number to model resolution through the line database
//! - Display and label field queries
//! - Template selection
//! - Empty label databases and closing connections

mod common;

use assert_matches::assert_matches;
use common::{LabelFixture, KNOWN_SN, LINE_NAME, MODEL_ID};
use label_printer::{
    db,
    errors::ServiceError,
    models::{FieldValue, ModelId, SerialNumber},
};

fn sn(raw: &str) -> SerialNumber {
    SerialNumber::parse(raw).unwrap()
}

#[tokio::test]
async fn lists_production_lines() {
    let fixture = LabelFixture::new().await;
    let service = fixture.service().await;

    let lines = service.production_lines().await.unwrap();
    assert_eq!(lines, vec![LINE_NAME.to_string()]);

    let line = service.production_line(LINE_NAME).await.unwrap();
    assert_eq!(line.sn_token, "{SN}");
    assert_eq!(line.credentials.user, "reader");

    service.close().await.unwrap();
}

#[tokio::test]
async fn empty_label_database_has_no_production_lines() {
    let fixture = LabelFixture::empty().await;
    let service = fixture.service().await;

    assert!(service.production_lines().await.unwrap().is_empty());
    assert_matches!(
        service.production_line(LINE_NAME).await,
        Err(ServiceError::NotFound(_))
    );

    service.close().await.unwrap();
}

#[tokio::test]
async fn close_releases_line_and_label_connections() {
    let fixture = LabelFixture::new().await;
    let label_pool = fixture.label_pool().await;
    let service = label_printer::services::LabelDataService::new(
        label_pool.clone(),
        fixture.settings(),
    );

    service.model_id(&sn(KNOWN_SN), LINE_NAME).await.unwrap();
    service.close().await.unwrap();

    assert!(db::check_connection(&label_pool).await.is_err());
}

#[tokio::test]
async fn unknown_production_line_is_not_found() {
    let fixture = LabelFixture::new().await;
    let service = fixture.service().await;

    assert_matches!(
        service.production_line("Line 9").await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        service.model_id(&sn(KNOWN_SN), "Line 9").await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn resolves_model_through_line_database() {
    let fixture = LabelFixture::new().await;
    let service = fixture.service().await;

    let model_id = service.model_id(&sn(KNOWN_SN), LINE_NAME).await.unwrap();
    assert_eq!(model_id, ModelId::Integer(MODEL_ID));
}

#[tokio::test]
async fn unknown_serial_and_unregistered_model_are_not_found() {
    let fixture = LabelFixture::new().await;
    let service = fixture.service().await;

    assert_matches!(
        service.model_id(&sn("NOPE1"), LINE_NAME).await,
        Err(ServiceError::NotFound(msg)) if msg.contains("NOPE1")
    );
    assert_matches!(
        service.model_id(&sn("ZZ999"), LINE_NAME).await,
        Err(ServiceError::NotFound(msg)) if msg.contains("Unregistered")
    );
    assert_matches!(
        service.model_id(&sn("NM001"), LINE_NAME).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn field_queries_need_a_line_connection() {
    let fixture = LabelFixture::new().await;
    let service = fixture.service().await;

    assert_matches!(
        service
            .label_data(&sn(KNOWN_SN), &ModelId::Integer(MODEL_ID))
            .await,
        Err(ServiceError::InvalidOperation(_))
    );
}

#[tokio::test]
async fn reads_display_and_label_data() {
    let fixture = LabelFixture::new().await;
    let service = fixture.service().await;

    let data = service.field_data(&sn(KNOWN_SN), LINE_NAME).await.unwrap();
    assert_eq!(data.model_id, ModelId::Integer(MODEL_ID));

    let display: Vec<&str> = data.display.names().collect();
    assert_eq!(display, vec!["Model", "Voltage", "Notes"]);
    assert_eq!(data.display.get("Model"), Some(&FieldValue::from("PX-200")));
    assert_eq!(data.display.get("Voltage"), Some(&FieldValue::Float(230.7)));
    assert_eq!(data.display.get("Notes"), Some(&FieldValue::Null));

    let label: Vec<&str> = data.label.names().collect();
    assert_eq!(label, vec!["Serial", "ModelName", "Voltage"]);
    assert_eq!(data.label.get("Serial"), Some(&FieldValue::from(KNOWN_SN)));

    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json["model_id"], 7);
    assert_eq!(json["label"]["ModelName"], "PX-200");
}

#[tokio::test]
async fn field_query_without_matching_unit_is_not_found() {
    let fixture = LabelFixture::new().await;
    let service = fixture.service().await;

    service.model_id(&sn(KNOWN_SN), LINE_NAME).await.unwrap();
    assert_matches!(
        service
            .display_data(&sn("NOPE1"), &ModelId::Integer(MODEL_ID))
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn model_without_stored_query_is_not_found() {
    let fixture = LabelFixture::new().await;
    let service = fixture.service().await;

    service.model_id(&sn(KNOWN_SN), LINE_NAME).await.unwrap();
    assert_matches!(
        service
            .label_data(&sn(KNOWN_SN), &ModelId::Integer(99))
            .await,
        Err(ServiceError::NotFound(msg)) if msg.contains("label query")
    );
}

#[tokio::test]
async fn selects_templates() {
    let fixture = LabelFixture::new().await;
    let service = fixture.service().await;
    let model_id = ModelId::Integer(MODEL_ID);

    let primary = service.primary_template(&model_id).await.unwrap();
    assert_eq!(primary.label_name, "Primary");
    assert_eq!(primary.template_file(), fixture.path("rating.btw"));

    let carton = service.template(&model_id, "Carton").await.unwrap();
    assert_eq!(carton.name, "carton.btw");

    let names: Vec<String> = service
        .templates(&model_id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.label_name)
        .collect();
    assert_eq!(names, vec!["Primary", "Carton"]);

    assert!(service
        .templates(&ModelId::Integer(99))
        .await
        .unwrap()
        .is_empty());
    assert_matches!(
        service.primary_template(&ModelId::Integer(99)).await,
        Err(ServiceError::NotFound(_))
    );
}
