//! Due scheduling integration tests for fees-service.

mod common;

use common::{date, TestApp};
use fees_service::models::{RecordPayment, StaffRole};
use serde_json::json;
use uuid::Uuid;

/// Helper to schedule a due over HTTP and return its id.
async fn schedule_due(app: &TestApp, invoice_id: Uuid, amount: i64, due_date: &str) -> String {
    let due: serde_json::Value = app
        .client
        .post(format!("{}/invoices/{}/dues", app.address, invoice_id))
        .json(&json!({ "amount": amount, "due_date": due_date }))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    due["due_id"]
        .as_str()
        .expect("Missing due_id")
        .to_string()
}

#[tokio::test]
async fn dues_are_listed_by_ascending_due_date() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 10000)]).await;

    schedule_due(&app, invoice_id, 2000, "2025-09-01").await;
    schedule_due(&app, invoice_id, 2000, "2025-07-01").await;
    schedule_due(&app, invoice_id, 2000, "2025-08-01").await;

    let dues: serde_json::Value = app
        .client
        .get(format!("{}/invoices/{}/dues", app.address, invoice_id))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");

    let dates: Vec<&str> = dues
        .as_array()
        .expect("Expected an array")
        .iter()
        .map(|d| d["due_date"].as_str().expect("Missing due_date"))
        .collect();
    assert_eq!(dates, vec!["2025-07-01", "2025-08-01", "2025-09-01"]);
}

#[tokio::test]
async fn extend_due_moves_the_date_forward_and_flags_it() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 10000)]).await;
    let due_id = schedule_due(&app, invoice_id, 4000, "2025-07-01").await;

    let response = app
        .client
        .post(format!("{}/dues/{}/extend", app.address, due_id))
        .json(&json!({ "new_due_date": "2025-07-15" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let due: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(due["status"], "extended");
    assert_eq!(due["due_date"], "2025-07-15");
}

#[tokio::test]
async fn extend_due_rejects_non_forward_dates() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 10000)]).await;
    let due_id = schedule_due(&app, invoice_id, 4000, "2025-07-01").await;

    for bad_date in ["2025-07-01", "2025-06-15"] {
        let response = app
            .client
            .post(format!("{}/dues/{}/extend", app.address, due_id))
            .json(&json!({ "new_due_date": bad_date }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), 400);
    }

    let due = app
        .db
        .get_due(due_id.parse().expect("Bad due id"))
        .await
        .expect("Failed to get due")
        .expect("Due disappeared");
    assert_eq!(due.status, "open");
    assert_eq!(due.due_date, date(2025, 7, 1));
}

#[tokio::test]
async fn extend_missing_due_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/dues/{}/extend", app.address, Uuid::new_v4()))
        .json(&json!({ "new_due_date": "2025-07-15" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn update_due_applies_partial_edits() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 10000)]).await;
    let due_id = schedule_due(&app, invoice_id, 4000, "2025-07-01").await;

    let response = app
        .client
        .put(format!("{}/dues/{}", app.address, due_id))
        .json(&json!({ "amount": 2500 }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let due: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(due["amount"], 2500);
    assert_eq!(due["due_date"], "2025-07-01");
    assert_eq!(due["status"], "open");
}

#[tokio::test]
async fn delete_due_removes_it() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 10000)]).await;
    let due_id = schedule_due(&app, invoice_id, 4000, "2025-07-01").await;

    let response = app
        .client
        .delete(format!("{}/dues/{}", app.address, due_id))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 204);

    let dues = app
        .db
        .list_dues_for_invoice(invoice_id)
        .await
        .expect("Failed to list dues");
    assert!(dues.is_empty());

    let response = app
        .client
        .delete(format!("{}/dues/{}", app.address, due_id))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn manual_due_cannot_exceed_the_outstanding_balance() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 1000)]).await;

    let response = app
        .client
        .post(format!("{}/invoices/{}/dues", app.address, invoice_id))
        .json(&json!({ "amount": 5000, "due_date": "2025-07-01" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 409);

    let dues = app
        .db
        .list_dues_for_invoice(invoice_id)
        .await
        .expect("Failed to list dues");
    assert!(dues.is_empty());
}

#[tokio::test]
async fn student_dues_carry_their_invoice_totals() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let staff_id = app.seed_staff("Meena Iyer", StaffRole::Office).await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 10000)]).await;

    app.db
        .record_payment(&RecordPayment {
            invoice_id,
            amount: 2000,
            date_paid: date(2025, 6, 5),
            received_by: staff_id,
            comment: None,
            due_id: None,
            next_due_date: None,
            next_due_amount: None,
        })
        .await
        .expect("Failed to record payment");

    schedule_due(&app, invoice_id, 4000, "2025-07-01").await;

    let entries: serde_json::Value = app
        .client
        .get(format!("{}/students/{}/dues", app.address, student_id))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");

    let rows = entries.as_array().expect("Expected an array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["amount"], 4000);
    assert_eq!(rows[0]["status"], "open");
    assert_eq!(rows[0]["total_amount"], 10000);
    assert_eq!(rows[0]["paid"], 2000);
    assert_eq!(rows[0]["balance"], 8000);
}

#[tokio::test]
async fn student_without_dues_gets_a_totals_only_entry() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let staff_id = app.seed_staff("Meena Iyer", StaffRole::Office).await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 10000)]).await;

    app.db
        .record_payment(&RecordPayment {
            invoice_id,
            amount: 2000,
            date_paid: date(2025, 6, 5),
            received_by: staff_id,
            comment: None,
            due_id: None,
            next_due_date: None,
            next_due_amount: None,
        })
        .await
        .expect("Failed to record payment");

    let entries: serde_json::Value = app
        .client
        .get(format!("{}/students/{}/dues", app.address, student_id))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");

    let rows = entries.as_array().expect("Expected an array");
    assert_eq!(rows.len(), 1);
    assert!(rows[0]["id"].is_null());
    assert!(rows[0]["due_date"].is_null());
    assert_eq!(rows[0]["total_amount"], 10000);
    assert_eq!(rows[0]["paid"], 2000);
    assert_eq!(rows[0]["balance"], 8000);
}

#[tokio::test]
async fn dues_for_unknown_student_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/students/{}/dues", app.address, Uuid::new_v4()))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn dues_list_filters_by_student_name() {
    let app = TestApp::spawn().await;
    let asha = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let rahul = app
        .seed_student("Rahul Singh", "Physics", date(2025, 6, 1))
        .await;
    let invoice_a = app.seed_invoice(asha, &[("Tuition", 10000)]).await;
    let invoice_r = app.seed_invoice(rahul, &[("Tuition", 8000)]).await;
    schedule_due(&app, invoice_a, 4000, "2025-07-01").await;
    schedule_due(&app, invoice_r, 3000, "2025-07-01").await;

    let all: serde_json::Value = app
        .client
        .get(format!("{}/dues", app.address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(all.as_array().map(|a| a.len()), Some(2));

    // Substring match, case-insensitive.
    let filtered: serde_json::Value = app
        .client
        .get(format!("{}/dues?student_name=asha", app.address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");

    let rows = filtered.as_array().expect("Expected an array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["student_name"], "Asha Verma");
    assert_eq!(rows[0]["amount"], 4000);
}
