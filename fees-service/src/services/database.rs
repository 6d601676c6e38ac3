//! Database service for fees-service.
//!
//! All financial mutations run inside transactions; the bill sequence is a
//! storage-backed singleton row incremented atomically so bill numbers stay
//! unique and gapless across concurrent recorders and across processes.

use crate::models::{
    Batch, BatchCompletion, BillSequence, CourseAdmissions, CreateBatch, CreateDue, CreateInvoice,
    CreateInvoiceItem, CreateStaff, CreateStudent, DashboardSummary, Due, DueListEntry, DueStatus,
    Invoice, InvoiceItem, InvoiceSummary, InvoiceTotals, ListDuesFilter, Receipt, RecordPayment,
    SetBillSequence, Staff, Student, StudentDueEntry, UpdateDue, UpdateReceipt,
};
use crate::services::metrics::{
    DB_QUERY_DURATION, DUE_EVENTS_TOTAL, INVOICES_TOTAL, OVERPAYMENTS_TOTAL, RECEIPTS_TOTAL,
};
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "fees-service"))]
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        info!(max_connections = max_connections, "Connecting to SQLite");

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("SQLite connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Student / Staff / Batch Directory Operations
    // -------------------------------------------------------------------------

    /// Register a student.
    #[instrument(skip(self, input), fields(student_name = %input.student_name))]
    pub async fn create_student(&self, input: &CreateStudent) -> Result<Student, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_student"])
            .start_timer();

        let student_id = Uuid::new_v4();
        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (student_id, student_name, course_name, date_of_admission, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING student_id, student_name, course_name, date_of_admission, created_utc
            "#,
        )
        .bind(student_id)
        .bind(&input.student_name)
        .bind(&input.course_name)
        .bind(input.date_of_admission)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create student: {}", e)))?;

        timer.observe_duration();

        info!(student_id = %student.student_id, "Student registered");

        Ok(student)
    }

    /// Get a student by ID.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn get_student(&self, student_id: Uuid) -> Result<Option<Student>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_student"])
            .start_timer();

        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, student_name, course_name, date_of_admission, created_utc
            FROM students
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get student: {}", e)))?;

        timer.observe_duration();

        Ok(student)
    }

    /// Register a staff member.
    #[instrument(skip(self, input), fields(staff_name = %input.staff_name))]
    pub async fn create_staff(&self, input: &CreateStaff) -> Result<Staff, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_staff"])
            .start_timer();

        let staff_id = Uuid::new_v4();
        let staff = sqlx::query_as::<_, Staff>(
            r#"
            INSERT INTO staff (staff_id, staff_name, role, created_utc)
            VALUES ($1, $2, $3, $4)
            RETURNING staff_id, staff_name, role, created_utc
            "#,
        )
        .bind(staff_id)
        .bind(&input.staff_name)
        .bind(input.role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create staff: {}", e)))?;

        timer.observe_duration();

        info!(staff_id = %staff.staff_id, role = %staff.role, "Staff registered");

        Ok(staff)
    }

    /// Get a staff member by ID.
    #[instrument(skip(self), fields(staff_id = %staff_id))]
    pub async fn get_staff(&self, staff_id: Uuid) -> Result<Option<Staff>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_staff"])
            .start_timer();

        let staff = sqlx::query_as::<_, Staff>(
            r#"
            SELECT staff_id, staff_name, role, created_utc
            FROM staff
            WHERE staff_id = $1
            "#,
        )
        .bind(staff_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get staff: {}", e)))?;

        timer.observe_duration();

        Ok(staff)
    }

    /// Register a batch.
    #[instrument(skip(self, input), fields(batch_name = %input.batch_name))]
    pub async fn create_batch(&self, input: &CreateBatch) -> Result<Batch, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_batch"])
            .start_timer();

        let batch_id = Uuid::new_v4();
        let batch = sqlx::query_as::<_, Batch>(
            r#"
            INSERT INTO batches (batch_id, batch_name, active, created_utc)
            VALUES ($1, $2, $3, $4)
            RETURNING batch_id, batch_name, active, created_utc
            "#,
        )
        .bind(batch_id)
        .bind(&input.batch_name)
        .bind(input.active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create batch: {}", e)))?;

        timer.observe_duration();

        Ok(batch)
    }

    /// List active batches.
    #[instrument(skip(self))]
    pub async fn list_active_batches(&self) -> Result<Vec<Batch>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_batches"])
            .start_timer();

        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT batch_id, batch_name, active, created_utc
            FROM batches
            WHERE active = 1
            ORDER BY batch_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list batches: {}", e)))?;

        timer.observe_duration();

        Ok(batches)
    }

    /// Record the attendance-completion flag for a batch and date. The
    /// attendance system owns this table in production; this writer exists
    /// for seeding.
    #[instrument(skip(self), fields(batch_id = %batch_id, date = %date))]
    pub async fn mark_attendance_complete(
        &self,
        batch_id: Uuid,
        date: NaiveDate,
        complete: bool,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO attendance_days (batch_id, attendance_date, complete)
            VALUES ($1, $2, $3)
            ON CONFLICT (batch_id, attendance_date) DO UPDATE SET complete = excluded.complete
            "#,
        )
        .bind(batch_id)
        .bind(date)
        .bind(complete)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to mark attendance: {}", e)))?;

        Ok(())
    }

    /// Attendance summary read API: whether the batch's attendance is
    /// complete for the given date. Absent rows read as incomplete.
    #[instrument(skip(self), fields(batch_id = %batch_id, date = %date))]
    pub async fn is_attendance_complete_for_date(
        &self,
        batch_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool, AppError> {
        let complete = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT COALESCE(
                (SELECT complete FROM attendance_days WHERE batch_id = $1 AND attendance_date = $2),
                0
            )
            "#,
        )
        .bind(batch_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to read attendance: {}", e)))?;

        Ok(complete)
    }

    // -------------------------------------------------------------------------
    // Invoice Ledger Operations
    // -------------------------------------------------------------------------

    /// Create an invoice with its initial items.
    #[instrument(skip(self, input), fields(student_id = %input.student_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        for item in &input.items {
            if item.amount < 0 {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Item amount must not be negative: '{}' has {}",
                    item.description,
                    item.amount
                )));
            }
        }

        self.get_student(input.student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (invoice_id, student_id, created_utc)
            VALUES ($1, $2, $3)
            RETURNING invoice_id, student_id, created_utc
            "#,
        )
        .bind(invoice_id)
        .bind(input.student_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        for (idx, item) in input.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (item_id, invoice_id, description, amount, sort_order, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(&item.description)
            .bind(item.amount)
            .bind(idx as i32)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice item: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        INVOICES_TOTAL.inc();

        info!(invoice_id = %invoice.invoice_id, items = input.items.len(), "Invoice created");

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, student_id, created_utc
            FROM invoices
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// List invoices with student context and computed totals.
    #[instrument(skip(self))]
    pub async fn list_invoices(&self) -> Result<Vec<InvoiceSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let invoices = sqlx::query_as::<_, InvoiceSummary>(
            r#"
            SELECT i.invoice_id,
                   i.student_id,
                   s.student_name,
                   COALESCE((SELECT SUM(ii.amount) FROM invoice_items ii WHERE ii.invoice_id = i.invoice_id), 0) AS total_amount_payable,
                   COALESCE((SELECT SUM(r.amount_paid) FROM receipts r WHERE r.invoice_id = i.invoice_id), 0) AS total_amount_paid,
                   COALESCE((SELECT SUM(ii.amount) FROM invoice_items ii WHERE ii.invoice_id = i.invoice_id), 0)
                 - COALESCE((SELECT SUM(r.amount_paid) FROM receipts r WHERE r.invoice_id = i.invoice_id), 0) AS balance,
                   i.created_utc
            FROM invoices i
            JOIN students s ON s.student_id = i.student_id
            ORDER BY i.created_utc DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Get the items of an invoice in display order.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_items"])
            .start_timer();

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT item_id, invoice_id, description, amount, sort_order, created_utc
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY sort_order ASC, created_utc ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get items: {}", e)))?;

        timer.observe_duration();

        Ok(items)
    }

    /// Derived totals for an invoice: payable, paid and balance. Always
    /// recomputed from items and receipts, never cached.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn invoice_totals(&self, invoice_id: Uuid) -> Result<InvoiceTotals, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_totals"])
            .start_timer();

        let payable = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM invoice_items WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum items: {}", e)))?;

        let paid = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount_paid), 0) FROM receipts WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum receipts: {}", e)))?;

        timer.observe_duration();

        Ok(InvoiceTotals {
            total_amount_payable: payable,
            total_amount_paid: paid,
            balance: payable - paid,
        })
    }

    /// Add an item to an existing invoice.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn add_invoice_item(
        &self,
        invoice_id: Uuid,
        input: &CreateInvoiceItem,
    ) -> Result<InvoiceItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["add_invoice_item"])
            .start_timer();

        if input.amount < 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Item amount must not be negative"
            )));
        }

        self.get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        let item = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (item_id, invoice_id, description, amount, sort_order, created_utc)
            VALUES (
                $1, $2, $3, $4,
                (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM invoice_items WHERE invoice_id = $2),
                $5
            )
            RETURNING item_id, invoice_id, description, amount, sort_order, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(&input.description)
        .bind(input.amount)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to add item: {}", e)))?;

        timer.observe_duration();

        Ok(item)
    }

    /// Remove an item from an invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, item_id = %item_id))]
    pub async fn remove_invoice_item(
        &self,
        invoice_id: Uuid,
        item_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["remove_invoice_item"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM invoice_items
            WHERE invoice_id = $1 AND item_id = $2
            "#,
        )
        .bind(invoice_id)
        .bind(item_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to remove item: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    /// Delete an invoice. Items, receipts and dues cascade.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        timer.observe_duration();

        if result.rows_affected() > 0 {
            info!(invoice_id = %invoice_id, "Invoice deleted");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // -------------------------------------------------------------------------
    // Receipt Recorder Operations
    // -------------------------------------------------------------------------

    /// Record a payment: reserve the next bill number, persist the receipt,
    /// settle the referenced due and schedule the follow-up due, all in one
    /// transaction. A failure after reservation rolls the number back.
    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id))]
    pub async fn record_payment(&self, input: &RecordPayment) -> Result<Receipt, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        if input.amount <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive, got {}",
                input.amount
            )));
        }
        match (input.next_due_date, input.next_due_amount) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "next_due_date and next_due_amount must be supplied together"
                )));
            }
            _ => {}
        }
        if matches!(input.next_due_amount, Some(amount) if amount < 0) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Next due amount must not be negative"
            )));
        }

        // Pre-checks: nothing is persisted until these resolve.
        let invoice = self
            .get_invoice(input.invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        let staff = self
            .get_staff(input.received_by)
            .await?
            .ok_or_else(|| {
                AppError::InvalidReceiver(anyhow::anyhow!(
                    "Staff {} does not exist",
                    input.received_by
                ))
            })?;
        if !staff.role().can_receive_payments() {
            return Err(AppError::InvalidReceiver(anyhow::anyhow!(
                "Staff '{}' has role '{}' and may not receive payments",
                staff.staff_name,
                staff.role
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Reserving first makes the increment the transaction's opening
        // write, so concurrent recorders serialize on the sequence row.
        let sequence = Self::reserve_bill_number(&mut *tx).await?;
        let bill_no = sequence.bill_number();

        if let Some(due_id) = input.due_id {
            let due = sqlx::query_as::<_, Due>(
                r#"
                SELECT due_id, invoice_id, status, amount, due_date, created_utc
                FROM dues
                WHERE due_id = $1
                "#,
            )
            .bind(due_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get due: {}", e)))?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Due not found")))?;

            if due.invoice_id != invoice.invoice_id {
                return Err(AppError::Inconsistent(anyhow::anyhow!(
                    "Due {} belongs to a different invoice",
                    due_id
                )));
            }
        }

        let receipt_id = Uuid::new_v4();
        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (
                receipt_id, invoice_id, due_id, bill_no, amount_paid, date_paid,
                comment, received_by, created_utc
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING receipt_id, invoice_id, due_id, bill_no, amount_paid, date_paid,
                      comment, received_by, created_utc
            "#,
        )
        .bind(receipt_id)
        .bind(input.invoice_id)
        .bind(input.due_id)
        .bind(&bill_no)
        .bind(input.amount)
        .bind(input.date_paid)
        .bind(&input.comment)
        .bind(input.received_by)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)))?;

        if let Some(due_id) = input.due_id {
            sqlx::query("UPDATE dues SET status = $1 WHERE due_id = $2")
                .bind(DueStatus::Closed.as_str())
                .bind(due_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to close due: {}", e))
                })?;
        }

        // Balance including this receipt, for the follow-up due guard and
        // the overpayment flag.
        let payable = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM invoice_items WHERE invoice_id = $1",
        )
        .bind(input.invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum items: {}", e)))?;

        let paid = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount_paid), 0) FROM receipts WHERE invoice_id = $1",
        )
        .bind(input.invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum receipts: {}", e)))?;

        let balance = payable - paid;

        if let (Some(next_date), Some(next_amount)) = (input.next_due_date, input.next_due_amount)
        {
            if next_amount > balance {
                return Err(AppError::Inconsistent(anyhow::anyhow!(
                    "Due amount {} exceeds outstanding balance {}",
                    next_amount,
                    balance
                )));
            }
            sqlx::query(
                r#"
                INSERT INTO dues (due_id, invoice_id, status, amount, due_date, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(input.invoice_id)
            .bind(DueStatus::Open.as_str())
            .bind(next_amount)
            .bind(next_date)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create follow-up due: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        RECEIPTS_TOTAL.inc();
        if input.due_id.is_some() {
            DUE_EVENTS_TOTAL.with_label_values(&["closed"]).inc();
        }
        if input.next_due_date.is_some() {
            DUE_EVENTS_TOTAL.with_label_values(&["opened"]).inc();
        }
        if balance < 0 {
            OVERPAYMENTS_TOTAL.inc();
            warn!(
                invoice_id = %input.invoice_id,
                balance = balance,
                "Invoice overpaid; receipt accepted and flagged"
            );
        }

        info!(
            receipt_id = %receipt.receipt_id,
            bill_no = %receipt.bill_no,
            amount = receipt.amount_paid,
            "Payment recorded"
        );

        Ok(receipt)
    }

    /// Get a receipt by ID.
    #[instrument(skip(self), fields(receipt_id = %receipt_id))]
    pub async fn get_receipt(&self, receipt_id: Uuid) -> Result<Option<Receipt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_receipt"])
            .start_timer();

        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT receipt_id, invoice_id, due_id, bill_no, amount_paid, date_paid,
                   comment, received_by, created_utc
            FROM receipts
            WHERE receipt_id = $1
            "#,
        )
        .bind(receipt_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get receipt: {}", e)))?;

        timer.observe_duration();

        Ok(receipt)
    }

    /// Get all receipts of an invoice, oldest first.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_receipts_for_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<Receipt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_receipts_for_invoice"])
            .start_timer();

        let receipts = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT receipt_id, invoice_id, due_id, bill_no, amount_paid, date_paid,
                   comment, received_by, created_utc
            FROM receipts
            WHERE invoice_id = $1
            ORDER BY date_paid ASC, created_utc ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list receipts: {}", e)))?;

        timer.observe_duration();

        Ok(receipts)
    }

    /// Administrative receipt correction. The bill number and invoice
    /// linkage are frozen at creation and cannot be edited.
    #[instrument(skip(self, input), fields(receipt_id = %receipt_id))]
    pub async fn update_receipt(
        &self,
        receipt_id: Uuid,
        input: &UpdateReceipt,
    ) -> Result<Option<Receipt>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_receipt"])
            .start_timer();

        if matches!(input.amount_paid, Some(amount) if amount <= 0) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Corrected amount must be positive"
            )));
        }

        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            UPDATE receipts
            SET amount_paid = COALESCE($1, amount_paid),
                date_paid = COALESCE($2, date_paid),
                comment = COALESCE($3, comment)
            WHERE receipt_id = $4
            RETURNING receipt_id, invoice_id, due_id, bill_no, amount_paid, date_paid,
                      comment, received_by, created_utc
            "#,
        )
        .bind(input.amount_paid)
        .bind(input.date_paid)
        .bind(&input.comment)
        .bind(receipt_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update receipt: {}", e)))?;

        timer.observe_duration();

        if let Some(ref receipt) = receipt {
            info!(receipt_id = %receipt.receipt_id, "Receipt corrected");
        }

        Ok(receipt)
    }

    // -------------------------------------------------------------------------
    // Due Scheduler Operations
    // -------------------------------------------------------------------------

    /// Create a due manually for an invoice.
    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id))]
    pub async fn create_due(&self, input: &CreateDue) -> Result<Due, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_due"])
            .start_timer();

        if input.amount < 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Due amount must not be negative"
            )));
        }

        self.get_invoice(input.invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        let totals = self.invoice_totals(input.invoice_id).await?;
        if input.amount > totals.balance {
            return Err(AppError::Inconsistent(anyhow::anyhow!(
                "Due amount {} exceeds outstanding balance {}",
                input.amount,
                totals.balance
            )));
        }

        let due = sqlx::query_as::<_, Due>(
            r#"
            INSERT INTO dues (due_id, invoice_id, status, amount, due_date, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING due_id, invoice_id, status, amount, due_date, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.invoice_id)
        .bind(DueStatus::Open.as_str())
        .bind(input.amount)
        .bind(input.due_date)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create due: {}", e)))?;

        timer.observe_duration();
        DUE_EVENTS_TOTAL.with_label_values(&["opened"]).inc();

        info!(due_id = %due.due_id, amount = due.amount, "Due created");

        Ok(due)
    }

    /// Get a due by ID.
    #[instrument(skip(self), fields(due_id = %due_id))]
    pub async fn get_due(&self, due_id: Uuid) -> Result<Option<Due>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_due"])
            .start_timer();

        let due = sqlx::query_as::<_, Due>(
            r#"
            SELECT due_id, invoice_id, status, amount, due_date, created_utc
            FROM dues
            WHERE due_id = $1
            "#,
        )
        .bind(due_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get due: {}", e)))?;

        timer.observe_duration();

        Ok(due)
    }

    /// List the dues of an invoice by ascending due date.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn list_dues_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<Due>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_dues_for_invoice"])
            .start_timer();

        let dues = sqlx::query_as::<_, Due>(
            r#"
            SELECT due_id, invoice_id, status, amount, due_date, created_utc
            FROM dues
            WHERE invoice_id = $1
            ORDER BY due_date ASC, created_utc ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list dues: {}", e)))?;

        timer.observe_duration();

        Ok(dues)
    }

    /// List dues across invoices, optionally filtered by student name.
    #[instrument(skip(self, filter))]
    pub async fn list_dues(&self, filter: &ListDuesFilter) -> Result<Vec<DueListEntry>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_dues"])
            .start_timer();

        let dues = sqlx::query_as::<_, DueListEntry>(
            r#"
            SELECT d.due_id, d.invoice_id, d.status, d.amount, d.due_date,
                   s.student_id, s.student_name
            FROM dues d
            JOIN invoices i ON i.invoice_id = d.invoice_id
            JOIN students s ON s.student_id = i.student_id
            WHERE ($1 IS NULL OR s.student_name LIKE '%' || $1 || '%')
            ORDER BY d.due_date ASC, d.created_utc ASC
            "#,
        )
        .bind(&filter.student_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list dues: {}", e)))?;

        timer.observe_duration();

        Ok(dues)
    }

    /// Push a due's date forward and flag it extended.
    #[instrument(skip(self), fields(due_id = %due_id))]
    pub async fn extend_due(&self, due_id: Uuid, new_due_date: NaiveDate) -> Result<Due, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["extend_due"])
            .start_timer();

        let due = self
            .get_due(due_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Due not found")))?;

        if new_due_date <= due.due_date {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "New due date {} must be after the current due date {}",
                new_due_date,
                due.due_date
            )));
        }

        let due = sqlx::query_as::<_, Due>(
            r#"
            UPDATE dues
            SET due_date = $1, status = $2
            WHERE due_id = $3
            RETURNING due_id, invoice_id, status, amount, due_date, created_utc
            "#,
        )
        .bind(new_due_date)
        .bind(DueStatus::Extended.as_str())
        .bind(due_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to extend due: {}", e)))?;

        timer.observe_duration();
        DUE_EVENTS_TOTAL.with_label_values(&["extended"]).inc();

        info!(due_id = %due.due_id, due_date = %due.due_date, "Due extended");

        Ok(due)
    }

    /// Administrative due edit (status, amount, date).
    #[instrument(skip(self, input), fields(due_id = %due_id))]
    pub async fn update_due(
        &self,
        due_id: Uuid,
        input: &UpdateDue,
    ) -> Result<Option<Due>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_due"])
            .start_timer();

        if matches!(input.amount, Some(amount) if amount < 0) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Due amount must not be negative"
            )));
        }

        let due = sqlx::query_as::<_, Due>(
            r#"
            UPDATE dues
            SET status = COALESCE($1, status),
                amount = COALESCE($2, amount),
                due_date = COALESCE($3, due_date)
            WHERE due_id = $4
            RETURNING due_id, invoice_id, status, amount, due_date, created_utc
            "#,
        )
        .bind(input.status.map(|s| s.as_str()))
        .bind(input.amount)
        .bind(input.due_date)
        .bind(due_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update due: {}", e)))?;

        timer.observe_duration();

        Ok(due)
    }

    /// Hard-delete a due (administrative override).
    #[instrument(skip(self), fields(due_id = %due_id))]
    pub async fn delete_due(&self, due_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_due"])
            .start_timer();

        let result = sqlx::query("DELETE FROM dues WHERE due_id = $1")
            .bind(due_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete due: {}", e)))?;

        timer.observe_duration();

        if result.rows_affected() > 0 {
            DUE_EVENTS_TOTAL.with_label_values(&["deleted"]).inc();
            info!(due_id = %due_id, "Due deleted");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// The dues of a student joined through their invoices, each entry
    /// carrying the owning invoice's totals. A student with no dues gets a
    /// single totals-only entry so the payload always reports balances.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn dues_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<StudentDueEntry>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dues_for_student"])
            .start_timer();

        self.get_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

        let dues = sqlx::query_as::<_, Due>(
            r#"
            SELECT d.due_id, d.invoice_id, d.status, d.amount, d.due_date, d.created_utc
            FROM dues d
            JOIN invoices i ON i.invoice_id = d.invoice_id
            WHERE i.student_id = $1
            ORDER BY d.due_date ASC, d.created_utc ASC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list dues: {}", e)))?;

        if dues.is_empty() {
            let payable = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COALESCE(SUM(ii.amount), 0)
                FROM invoice_items ii
                JOIN invoices i ON i.invoice_id = ii.invoice_id
                WHERE i.student_id = $1
                "#,
            )
            .bind(student_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum items: {}", e)))?;

            let paid = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COALESCE(SUM(r.amount_paid), 0)
                FROM receipts r
                JOIN invoices i ON i.invoice_id = r.invoice_id
                WHERE i.student_id = $1
                "#,
            )
            .bind(student_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to sum receipts: {}", e))
            })?;

            timer.observe_duration();

            return Ok(vec![StudentDueEntry {
                id: None,
                amount: None,
                due_date: None,
                status: None,
                total_amount: payable,
                balance: payable - paid,
                paid,
            }]);
        }

        let mut totals_by_invoice: HashMap<Uuid, InvoiceTotals> = HashMap::new();
        let mut entries = Vec::with_capacity(dues.len());
        for due in dues {
            let totals = match totals_by_invoice.get(&due.invoice_id) {
                Some(totals) => *totals,
                None => {
                    let totals = self.invoice_totals(due.invoice_id).await?;
                    totals_by_invoice.insert(due.invoice_id, totals);
                    totals
                }
            };
            entries.push(StudentDueEntry {
                id: Some(due.due_id),
                amount: Some(due.amount),
                due_date: Some(due.due_date),
                status: Some(due.status),
                total_amount: totals.total_amount_payable,
                balance: totals.balance,
                paid: totals.total_amount_paid,
            });
        }

        timer.observe_duration();

        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Bill Sequence Operations
    // -------------------------------------------------------------------------

    /// Atomically increment the sequence and return the new state. Callers
    /// inside a transaction pass their transaction handle so a later failure
    /// rolls the reservation back.
    async fn reserve_bill_number<'e, E>(executor: E) -> Result<BillSequence, AppError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, BillSequence>(
            r#"
            UPDATE bill_sequence
            SET last_bill = last_bill + 1
            WHERE id = 1
            RETURNING prefix, last_bill
            "#,
        )
        .fetch_one(executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.message().contains("locked") => {
                AppError::Conflict(anyhow::anyhow!(
                    "Bill number reservation could not be serialized: {}",
                    e
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to reserve bill number: {}", e)),
        })
    }

    /// Reserve the next bill number outside a receipt (autocommit).
    #[instrument(skip(self))]
    pub async fn next_bill_number(&self) -> Result<BillSequence, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["next_bill_number"])
            .start_timer();

        let sequence = Self::reserve_bill_number(&self.pool).await?;

        timer.observe_duration();

        Ok(sequence)
    }

    /// Read the sequence state.
    #[instrument(skip(self))]
    pub async fn bill_sequence_state(&self) -> Result<BillSequence, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["bill_sequence_state"])
            .start_timer();

        let sequence =
            sqlx::query_as::<_, BillSequence>("SELECT prefix, last_bill FROM bill_sequence WHERE id = 1")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to read bill sequence: {}", e))
                })?;

        timer.observe_duration();

        Ok(sequence)
    }

    /// Administrative sequence override, e.g. to align with a paper ledger.
    #[instrument(skip(self, input))]
    pub async fn set_bill_sequence(&self, input: &SetBillSequence) -> Result<BillSequence, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_bill_sequence"])
            .start_timer();

        if matches!(input.last_bill, Some(last_bill) if last_bill < 0) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Sequence counter must not be negative"
            )));
        }

        let sequence = sqlx::query_as::<_, BillSequence>(
            r#"
            UPDATE bill_sequence
            SET prefix = COALESCE($1, prefix),
                last_bill = COALESCE($2, last_bill)
            WHERE id = 1
            RETURNING prefix, last_bill
            "#,
        )
        .bind(&input.prefix)
        .bind(input.last_bill)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to set bill sequence: {}", e))
        })?;

        timer.observe_duration();

        info!(
            prefix = %sequence.prefix,
            last_bill = sequence.last_bill,
            "Bill sequence overridden"
        );

        Ok(sequence)
    }

    // -------------------------------------------------------------------------
    // Reporting Aggregator Operations
    // -------------------------------------------------------------------------

    /// Dashboard rollup for students admitted in `[start_date, end_date]`.
    /// Tolerates an empty range; every division is guarded.
    #[instrument(skip(self), fields(start_date = %start_date, end_date = %end_date))]
    pub async fn dashboard_summary(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        as_of_date: NaiveDate,
    ) -> Result<DashboardSummary, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dashboard_summary"])
            .start_timer();

        let admissions = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM students WHERE date_of_admission BETWEEN $1 AND $2",
        )
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count admissions: {}", e)))?;

        let total_invoice_amount = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(ii.amount), 0)
            FROM invoice_items ii
            JOIN invoices i ON i.invoice_id = ii.invoice_id
            JOIN students s ON s.student_id = i.student_id
            WHERE s.date_of_admission BETWEEN $1 AND $2
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum invoices: {}", e)))?;

        let total_collected_amount = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(r.amount_paid), 0)
            FROM receipts r
            JOIN invoices i ON i.invoice_id = r.invoice_id
            JOIN students s ON s.student_id = i.student_id
            WHERE s.date_of_admission BETWEEN $1 AND $2
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum receipts: {}", e)))?;

        let course_breakdown = sqlx::query_as::<_, CourseAdmissions>(
            r#"
            SELECT course_name, COUNT(*) AS admission_count
            FROM students
            WHERE date_of_admission BETWEEN $1 AND $2
            GROUP BY course_name
            ORDER BY admission_count DESC, course_name ASC
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to group courses: {}", e)))?;

        let batches = self.list_active_batches().await?;
        let mut completed = 0i64;
        for batch in &batches {
            if self
                .is_attendance_complete_for_date(batch.batch_id, as_of_date)
                .await?
            {
                completed += 1;
            }
        }
        let batch_completion = BatchCompletion {
            total: batches.len() as i64,
            completed,
            not_completed: batches.len() as i64 - completed,
        };

        let average_per_admission = if admissions > 0 {
            round2(total_invoice_amount as f64 / admissions as f64)
        } else {
            0.0
        };
        let collection_rate_percent = if total_invoice_amount > 0 {
            round2(total_collected_amount as f64 / total_invoice_amount as f64 * 100.0)
        } else {
            0.0
        };

        timer.observe_duration();

        Ok(DashboardSummary {
            start_date,
            end_date,
            total_invoices: admissions,
            total_invoice_amount,
            total_collected_amount,
            average_per_admission,
            collection_rate_percent,
            course_breakdown,
            batch_completion,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
