//! Invoice ledger integration tests for fees-service.

mod common;

use common::{date, TestApp};
use fees_service::models::{RecordPayment, StaffRole};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn create_invoice_returns_created_with_items() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;

    let response = app
        .client
        .post(format!("{}/invoices", app.address))
        .json(&json!({
            "student_id": student_id,
            "items": [
                { "description": "Admission fee", "amount": 2000 },
                { "description": "Tuition (June)", "amount": 8000 }
            ]
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    let invoice_id = body["invoice_id"].as_str().expect("Missing invoice_id");

    let detail: serde_json::Value = app
        .client
        .get(format!("{}/invoices/{}", app.address, invoice_id))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(detail["student_name"], "Asha Verma");
    assert_eq!(detail["items"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(detail["total_amount_payable"], 10000);
    assert_eq!(detail["total_amount_paid"], 0);
    assert_eq!(detail["balance"], 10000);
    assert_eq!(detail["receipts"].as_array().map(|a| a.len()), Some(0));
}

#[tokio::test]
async fn balance_tracks_item_and_receipt_mutations() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Rahul Singh", "Physics", date(2025, 6, 1))
        .await;
    let staff_id = app.seed_staff("Meena Iyer", StaffRole::Office).await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 10000)]).await;

    app.db
        .record_payment(&RecordPayment {
            invoice_id,
            amount: 4000,
            date_paid: date(2025, 6, 10),
            received_by: staff_id,
            comment: None,
            due_id: None,
            next_due_date: None,
            next_due_amount: None,
        })
        .await
        .expect("Failed to record payment");

    let totals = app
        .db
        .invoice_totals(invoice_id)
        .await
        .expect("Failed to read totals");
    assert_eq!(totals.total_amount_payable, 10000);
    assert_eq!(totals.total_amount_paid, 4000);
    assert_eq!(totals.balance, 6000);

    // Adding an item raises the payable side only.
    let item: serde_json::Value = app
        .client
        .post(format!("{}/invoices/{}/items", app.address, invoice_id))
        .json(&json!({ "description": "Lab kit", "amount": 500 }))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");

    let totals = app
        .db
        .invoice_totals(invoice_id)
        .await
        .expect("Failed to read totals");
    assert_eq!(totals.total_amount_payable, 10500);
    assert_eq!(totals.balance, 6500);

    // Removing it restores the previous balance.
    let item_id = item["item_id"].as_str().expect("Missing item_id");
    let response = app
        .client
        .delete(format!(
            "{}/invoices/{}/items/{}",
            app.address, invoice_id, item_id
        ))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 204);

    let totals = app
        .db
        .invoice_totals(invoice_id)
        .await
        .expect("Failed to read totals");
    assert_eq!(totals.total_amount_payable, 10000);
    assert_eq!(totals.balance, 6000);
}

#[tokio::test]
async fn create_invoice_requires_at_least_one_item() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;

    let response = app
        .client
        .post(format!("{}/invoices", app.address))
        .json(&json!({ "student_id": student_id, "items": [] }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn create_invoice_rejects_negative_item_amount() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;

    let response = app
        .client
        .post(format!("{}/invoices", app.address))
        .json(&json!({
            "student_id": student_id,
            "items": [{ "description": "Tuition", "amount": -100 }]
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 422);

    let invoices: serde_json::Value = app
        .client
        .get(format!("{}/invoices", app.address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(invoices.as_array().map(|a| a.len()), Some(0));
}

#[tokio::test]
async fn create_invoice_for_unknown_student_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/invoices", app.address))
        .json(&json!({
            "student_id": Uuid::new_v4(),
            "items": [{ "description": "Tuition", "amount": 1000 }]
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn list_invoices_includes_student_and_totals() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    app.seed_invoice(student_id, &[("Tuition", 7000)]).await;

    let invoices: serde_json::Value = app
        .client
        .get(format!("{}/invoices", app.address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");

    let rows = invoices.as_array().expect("Expected an array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["student_name"], "Asha Verma");
    assert_eq!(rows[0]["total_amount_payable"], 7000);
    assert_eq!(rows[0]["balance"], 7000);
}

#[tokio::test]
async fn delete_invoice_cascades_to_items_and_receipts() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Rahul Singh", "Physics", date(2025, 6, 1))
        .await;
    let staff_id = app.seed_staff("Meena Iyer", StaffRole::Admin).await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 5000)]).await;

    app.db
        .record_payment(&RecordPayment {
            invoice_id,
            amount: 1000,
            date_paid: date(2025, 6, 5),
            received_by: staff_id,
            comment: None,
            due_id: None,
            next_due_date: None,
            next_due_amount: None,
        })
        .await
        .expect("Failed to record payment");

    let response = app
        .client
        .delete(format!("{}/invoices/{}", app.address, invoice_id))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 204);

    let response = app
        .client
        .get(format!("{}/invoices/{}", app.address, invoice_id))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);

    let receipts = app
        .db
        .get_receipts_for_invoice(invoice_id)
        .await
        .expect("Failed to list receipts");
    assert!(receipts.is_empty());
}

#[tokio::test]
async fn item_routes_reject_unknown_targets() {
    let app = TestApp::spawn().await;
    let student_id = app
        .seed_student("Asha Verma", "Mathematics", date(2025, 6, 1))
        .await;
    let invoice_id = app.seed_invoice(student_id, &[("Tuition", 1000)]).await;

    let response = app
        .client
        .post(format!("{}/invoices/{}/items", app.address, Uuid::new_v4()))
        .json(&json!({ "description": "Tuition", "amount": 100 }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);

    let response = app
        .client
        .delete(format!(
            "{}/invoices/{}/items/{}",
            app.address,
            invoice_id,
            Uuid::new_v4()
        ))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), 404);
}
