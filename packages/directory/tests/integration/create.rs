use chrono::Utc;
use common::storage::BlobStore;
use directory::ServiceError;
use directory::models::{EmployeeDraft, FieldErrorKind, Upload};

use crate::common::{TestApp, draft, png};

mod validation {
    use super::*;

    #[tokio::test]
    async fn minimal_employee_is_created_without_picture() {
        let app = TestApp::spawn().await;
        let before = Utc::now();

        let view = app
            .service
            .create_employee(draft("John", "john@x.com"), None)
            .await
            .unwrap();

        let e = &view.employee;
        assert_eq!(e.first_name, "John");
        assert_eq!(e.picture_key, None);
        assert_eq!(view.picture_url, None);
        assert_eq!(e.created_at, e.updated_at);
        assert!(e.created_at >= before);
        assert_eq!(app.record_count().await, 1);
    }

    #[tokio::test]
    async fn empty_first_name_fails_without_touching_either_store() {
        let app = TestApp::spawn().await;
        let picture = png(b"avatar");

        let err = app
            .service
            .create_employee(draft("", "john@x.com"), Some(picture))
            .await
            .unwrap_err();

        let errors = match err {
            ServiceError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        };
        assert!(errors.iter().any(|e| e.to_string() == "first_name required"));
        assert_eq!(app.record_count().await, 0);
        assert_eq!(app.blobs.puts(), 0);
    }

    #[tokio::test]
    async fn all_violations_are_reported_together() {
        let app = TestApp::spawn().await;
        let candidate = EmployeeDraft {
            first_name: String::new(),
            last_name: String::new(),
            email: "nope".into(),
            position: "Engineer".into(),
            department: "Eng".into(),
            phone: None,
            hire_date: Some("2021-13-01".into()),
        };

        let Err(ServiceError::Validation(errors)) =
            app.service.create_employee(candidate, None).await
        else {
            panic!("expected validation error");
        };
        let kinds: Vec<_> = errors.iter().map(|e| (e.field, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("first_name", FieldErrorKind::Required),
                ("last_name", FieldErrorKind::Required),
                ("email", FieldErrorKind::InvalidEmail),
                ("hire_date", FieldErrorKind::InvalidDate),
            ]
        );
    }
}

mod uniqueness {
    use super::*;

    #[tokio::test]
    async fn second_create_with_same_email_is_rejected() {
        let app = TestApp::spawn().await;
        app.service
            .create_employee(draft("A", "a@x.com"), None)
            .await
            .unwrap();

        let err = app
            .service
            .create_employee(draft("B", "a@x.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateEmail(_)));
        assert_eq!(app.record_count().await, 1);
    }

    #[tokio::test]
    async fn email_comparison_ignores_case_in_either_order() {
        for (first, second) in [("a@x.com", "A@X.COM"), ("A@X.COM", "a@x.com")] {
            let app = TestApp::spawn().await;
            let results = [
                app.service.create_employee(draft("A", first), None).await,
                app.service.create_employee(draft("B", second), None).await,
            ];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(matches!(results[1], Err(ServiceError::DuplicateEmail(_))));
        }
    }

    #[tokio::test]
    async fn uniqueness_scan_spans_every_page() {
        let app = TestApp::spawn().await;
        for n in 0..7 {
            app.service
                .create_employee(draft("N", &format!("user{n}@x.com")), None)
                .await
                .unwrap();
        }
        for n in 0..7 {
            let result = app
                .service
                .create_employee(draft("Dup", &format!("USER{n}@x.com")), None)
                .await;
            assert!(matches!(result, Err(ServiceError::DuplicateEmail(_))), "{n}");
        }
    }
}

mod pictures {
    use super::*;

    #[tokio::test]
    async fn picture_is_retrievable_through_a_signed_url() {
        let app = TestApp::spawn().await;

        let view = app
            .service
            .create_employee(draft("John", "john@x.com"), Some(png(b"pixels")))
            .await
            .unwrap();

        let stored = app
            .service
            .get_employee(view.employee.employee_id)
            .await
            .unwrap();
        let key = stored.employee.picture_key.clone().unwrap();
        assert_eq!(key.owner(), view.employee.employee_id.to_string());
        assert_eq!(app.blobs.inner.get(&key).await.unwrap(), b"pixels");

        let url = stored.picture_url.unwrap();
        assert_eq!(app.blobs.inner.signer().verify(&url, Utc::now()).unwrap(), key);
    }

    #[tokio::test]
    async fn oversized_picture_is_rejected_before_upload() {
        let app = TestApp::spawn_with_limits(4).await;

        let err = app
            .service
            .create_employee(draft("John", "john@x.com"), Some(png(b"too large")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::PayloadTooLarge {
                actual: 9,
                limit: 4
            }
        ));
        assert_eq!(app.blobs.puts(), 0);
        assert_eq!(app.record_count().await, 0);
    }

    #[tokio::test]
    async fn non_image_picture_is_unsupported() {
        let app = TestApp::spawn().await;
        let pdf = Upload::new(b"%PDF".to_vec(), "application/pdf");

        let err = app
            .service
            .create_employee(draft("John", "john@x.com"), Some(pdf))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedType(_)));
        assert_eq!(app.blobs.puts(), 0);
    }
}

mod partial_failure {
    use super::*;

    #[tokio::test]
    async fn failed_persist_deletes_the_uploaded_picture() {
        let app = TestApp::spawn().await;
        app.records.fail_puts(true);

        let err = app
            .service
            .create_employee(draft("John", "john@x.com"), Some(png(b"pixels")))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::StoreUnavailable(_)));
        assert_eq!(app.blobs.puts(), 1);
        assert_eq!(app.blob_count().await, 0);
        assert_eq!(app.record_count().await, 0);
    }

    #[tokio::test]
    async fn failed_cleanup_still_reports_the_persist_error() {
        let app = TestApp::spawn().await;
        app.records.fail_puts(true);
        app.blobs.fail_deletes(true);

        let err = app
            .service
            .create_employee(draft("John", "john@x.com"), Some(png(b"pixels")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StoreUnavailable(_)));

        // The orphan stays behind for reconciliation.
        app.blobs.fail_deletes(false);
        let report = app.service.find_orphans().await.unwrap();
        assert_eq!(report.unowned_blobs.len(), 1);
    }

    #[tokio::test]
    async fn committed_create_survives_a_failing_blob_read() {
        let app = TestApp::spawn().await;
        app.blobs.fail_reads(true);

        let view = app
            .service
            .create_employee(draft("John", "john@x.com"), Some(png(b"pixels")))
            .await
            .unwrap();
        assert_eq!(app.record_count().await, 1);
        let key = view.employee.picture_key.clone().unwrap();
        assert!(app.blob_exists(&key).await);
        assert!(view.picture_url.is_some());

        let retry = app
            .service
            .create_employee(draft("John", "john@x.com"), None)
            .await;
        assert!(matches!(retry, Err(ServiceError::DuplicateEmail(_))));
        assert_eq!(app.record_count().await, 1);
    }
}
