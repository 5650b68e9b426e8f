use directory::ServiceError;
use directory::models::{EmployeeId, EmployeeView};

use crate::common::{TestApp, draft, png};

async fn seeded(app: &TestApp, picture: bool) -> EmployeeView {
    let picture = picture.then(|| png(b"original"));
    app.service
        .create_employee(draft("John", "john@x.com"), picture)
        .await
        .unwrap()
}

mod fields {
    use super::*;

    #[tokio::test]
    async fn missing_employee_is_not_found() {
        let app = TestApp::spawn().await;
        let err = app
            .service
            .update_employee(EmployeeId::new(), draft("John", "john@x.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn field_update_refreshes_only_updated_at() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, false).await.employee;

        let mut changes = draft("Johnny", "john@x.com");
        changes.department = "Sales".into();
        let updated = app
            .service
            .update_employee(created.employee_id, changes, None)
            .await
            .unwrap()
            .employee;

        assert_eq!(updated.first_name, "Johnny");
        assert_eq!(updated.department, "Sales");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);

        let stored = app.service.get_employee(created.employee_id).await.unwrap();
        assert_eq!(stored.employee, updated);
    }

    #[tokio::test]
    async fn field_update_never_mutates_the_blob_store() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, true).await.employee;
        app.blobs.reset();

        let updated = app
            .service
            .update_employee(created.employee_id, draft("Jack", "jack@x.com"), None)
            .await
            .unwrap();

        assert_eq!(app.blobs.puts(), 0);
        assert_eq!(app.blobs.deletes(), 0);
        assert_eq!(updated.employee.picture_key, created.picture_key);
        assert!(updated.picture_url.is_some());
    }

    #[tokio::test]
    async fn invalid_candidate_leaves_record_untouched() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, false).await.employee;

        let err = app
            .service
            .update_employee(created.employee_id, draft("John", "broken"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let stored = app.service.get_employee(created.employee_id).await.unwrap();
        assert_eq!(stored.employee, created);
    }

    #[tokio::test]
    async fn changing_email_to_a_taken_one_is_rejected() {
        let app = TestApp::spawn().await;
        let john = seeded(&app, false).await.employee;
        app.service
            .create_employee(draft("Jane", "jane@x.com"), None)
            .await
            .unwrap();

        let err = app
            .service
            .update_employee(john.employee_id, draft("John", "JANE@x.com"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn keeping_own_email_in_different_case_is_allowed() {
        let app = TestApp::spawn().await;
        let john = seeded(&app, false).await.employee;

        let updated = app
            .service
            .update_employee(john.employee_id, draft("John", "John@X.com"), None)
            .await
            .unwrap();
        assert_eq!(updated.employee.email, "John@X.com");
    }
}

mod pictures {
    use super::*;

    #[tokio::test]
    async fn new_picture_replaces_the_old_one() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, true).await.employee;
        let old_key = created.picture_key.clone().unwrap();

        let updated = app
            .service
            .update_employee(
                created.employee_id,
                draft("John", "john@x.com"),
                Some(png(b"replacement")),
            )
            .await
            .unwrap();
        let new_key = updated.employee.picture_key.clone().unwrap();

        assert_ne!(new_key, old_key);
        assert!(!app.blob_exists(&old_key).await);
        assert!(app.blob_exists(&new_key).await);
        assert_eq!(app.blob_count().await, 1);
        assert!(updated.picture_url.is_some());
    }

    #[tokio::test]
    async fn failed_persist_keeps_the_old_picture() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, true).await.employee;
        let old_key = created.picture_key.clone().unwrap();
        app.records.fail_puts(true);

        let err = app
            .service
            .update_employee(
                created.employee_id,
                draft("John", "john@x.com"),
                Some(png(b"replacement")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StoreUnavailable(_)));

        assert!(app.blob_exists(&old_key).await);
        assert_eq!(app.blob_count().await, 1);
        let stored = app.service.get_employee(created.employee_id).await.unwrap();
        assert_eq!(stored.employee.picture_key, Some(old_key));
    }

    #[tokio::test]
    async fn failed_old_picture_cleanup_does_not_fail_the_update() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, true).await.employee;
        app.blobs.fail_deletes(true);

        let updated = app
            .service
            .set_picture(created.employee_id, png(b"replacement"))
            .await
            .unwrap();
        assert_ne!(updated.employee.picture_key, created.picture_key);

        app.blobs.fail_deletes(false);
        let report = app.service.find_orphans().await.unwrap();
        assert_eq!(report.unreferenced_pictures, vec![created.picture_key.unwrap()]);
    }

    #[tokio::test]
    async fn set_picture_on_employee_without_one() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, false).await.employee;

        let updated = app
            .service
            .set_picture(created.employee_id, png(b"first"))
            .await
            .unwrap();
        let key = updated.employee.picture_key.clone().unwrap();
        assert!(app.blob_exists(&key).await);
        assert!(updated.employee.updated_at > created.updated_at);
        assert_eq!(app.blobs.deletes(), 0);
    }

    #[tokio::test]
    async fn remove_picture_commits_record_then_deletes_blob() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, true).await.employee;
        let key = created.picture_key.clone().unwrap();

        let updated = app
            .service
            .remove_picture(created.employee_id)
            .await
            .unwrap();
        assert_eq!(updated.employee.picture_key, None);
        assert_eq!(updated.picture_url, None);
        assert!(!app.blob_exists(&key).await);

        let stored = app.service.get_employee(created.employee_id).await.unwrap();
        assert_eq!(stored.employee.picture_key, None);
    }

    #[tokio::test]
    async fn remove_picture_without_one_changes_nothing() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, false).await.employee;

        let view = app
            .service
            .remove_picture(created.employee_id)
            .await
            .unwrap();
        assert_eq!(view.employee, created);
    }

    #[tokio::test]
    async fn failed_remove_keeps_the_picture() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, true).await.employee;
        let key = created.picture_key.clone().unwrap();
        app.records.fail_puts(true);

        assert!(app.service.remove_picture(created.employee_id).await.is_err());
        assert!(app.blob_exists(&key).await);
    }
}

mod committed {
    use super::*;

    #[tokio::test]
    async fn picture_update_is_reported_once_committed_despite_read_failures() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, true).await.employee;
        let old = created.picture_key.clone().unwrap();
        app.blobs.fail_reads(true);

        let updated = app
            .service
            .update_employee(created.employee_id, draft("John", "john@x.com"), Some(png(b"new")))
            .await
            .unwrap();
        let new = updated.employee.picture_key.clone().unwrap();
        assert_ne!(new, old);

        app.blobs.fail_reads(false);
        assert!(app.blob_exists(&new).await);
        assert!(!app.blob_exists(&old).await);
        assert_eq!(app.blob_count().await, 1);
    }

    #[tokio::test]
    async fn picture_removal_succeeds_despite_read_failures() {
        let app = TestApp::spawn().await;
        let created = seeded(&app, true).await.employee;
        app.blobs.fail_reads(true);

        let view = app
            .service
            .remove_picture(created.employee_id)
            .await
            .unwrap();
        assert_eq!(view.employee.picture_key, None);
        assert_eq!(view.picture_url, None);
    }
}
