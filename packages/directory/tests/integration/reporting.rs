use common::storage::{BlobKey, BlobMetadata, BlobStore};
use directory::models::{ComponentHealth, Upload};

use crate::common::{TestApp, draft, png};

#[tokio::test]
async fn statistics_count_groups_and_blob_usage() {
    let app = TestApp::spawn().await;
    let mut sales = draft("Sam", "sam@x.com");
    sales.department = "Sales".into();
    sales.position = "Manager".into();
    app.service.create_employee(sales, None).await.unwrap();
    app.service
        .create_employee(draft("John", "john@x.com"), Some(png(b"1234")))
        .await
        .unwrap();
    let jane = app
        .service
        .create_employee(draft("Jane", "jane@x.com"), None)
        .await
        .unwrap()
        .employee
        .employee_id;
    app.service
        .upload_document(jane, "resume", Upload::new(b"123456".to_vec(), "text/plain"))
        .await
        .unwrap();

    let stats = app.service.get_statistics().await.unwrap();
    assert_eq!(stats.total_employees, 3);
    assert_eq!(stats.total_departments, 2);
    assert_eq!(stats.total_positions, 2);
    assert_eq!(stats.by_department["Eng"], 2);
    assert_eq!(stats.by_department["Sales"], 1);
    assert_eq!(stats.by_position["Engineer"], 2);
    assert_eq!(stats.with_pictures, 1);
    assert_eq!(stats.blob_usage.objects, 2);
    assert_eq!(stats.blob_usage.bytes, 10);
}

#[tokio::test]
async fn empty_directory_has_zero_statistics() {
    let app = TestApp::spawn().await;
    let stats = app.service.get_statistics().await.unwrap();
    assert_eq!(stats.total_employees, 0);
    assert!(stats.by_department.is_empty());
    assert_eq!(stats.blob_usage.objects, 0);
}

#[tokio::test]
async fn health_reports_each_component() {
    let app = TestApp::spawn().await;
    let health = app.service.health_check().await;
    assert_eq!(health.database, ComponentHealth::Healthy);
    assert_eq!(health.storage, ComponentHealth::Healthy);
    assert_eq!(health.overall, ComponentHealth::Healthy);
}

#[tokio::test]
async fn consistent_stores_report_no_orphans() {
    let app = TestApp::spawn().await;
    app.service
        .create_employee(draft("John", "john@x.com"), Some(png(b"pixels")))
        .await
        .unwrap();
    assert!(app.service.find_orphans().await.unwrap().is_clean());
}

#[tokio::test]
async fn orphan_report_finds_every_kind_of_drift() {
    let app = TestApp::spawn().await;
    let john = app
        .service
        .create_employee(draft("John", "john@x.com"), Some(png(b"pixels")))
        .await
        .unwrap()
        .employee;
    let jane = app
        .service
        .create_employee(draft("Jane", "jane@x.com"), Some(png(b"pixels")))
        .await
        .unwrap()
        .employee;

    // A blob left behind by an employee that no longer exists.
    let ghost = BlobKey::picture("0b7e7f57-1a53-4f2e-9d1e-3c5a1b2c3d4e", Some("png")).unwrap();
    let meta = BlobMetadata::new(ghost.owner(), "image/png");
    app.blobs.inner.put(&ghost, b"boo", &meta).await.unwrap();

    // A second picture for John that his record does not reference.
    let stray = BlobKey::picture(&john.employee_id.to_string(), Some("png")).unwrap();
    let meta = BlobMetadata::new(stray.owner(), "image/png");
    app.blobs.inner.put(&stray, b"stray", &meta).await.unwrap();

    // Jane's picture vanishes out of band.
    app.blobs
        .inner
        .delete(jane.picture_key.as_ref().unwrap())
        .await
        .unwrap();

    let report = app.service.find_orphans().await.unwrap();
    assert_eq!(report.unowned_blobs, vec![ghost]);
    assert_eq!(report.unreferenced_pictures, vec![stray]);
    assert_eq!(report.dangling_pictures, vec![jane.employee_id]);

    // Reporting reclaims nothing.
    assert_eq!(app.blob_count().await, 3);
}

#[tokio::test]
async fn dangling_picture_yields_no_url() {
    let app = TestApp::spawn().await;
    let john = app
        .service
        .create_employee(draft("John", "john@x.com"), Some(png(b"pixels")))
        .await
        .unwrap()
        .employee;
    app.blobs
        .inner
        .delete(john.picture_key.as_ref().unwrap())
        .await
        .unwrap();

    let view = app.service.get_employee(john.employee_id).await.unwrap();
    assert_eq!(view.employee.picture_key, john.picture_key);
    assert_eq!(view.picture_url, None);
}
