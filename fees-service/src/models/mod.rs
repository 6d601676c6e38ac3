//! Domain models for fees-service.

mod batch;
mod bill_sequence;
mod dashboard;
mod due;
mod invoice;
mod receipt;
mod staff;
mod student;

pub use batch::{Batch, CreateBatch};
pub use bill_sequence::{BillSequence, SetBillSequence};
pub use dashboard::{BatchCompletion, CourseAdmissions, DashboardSummary};
pub use due::{
    CreateDue, Due, DueListEntry, DueStatus, ListDuesFilter, StudentDueEntry, UpdateDue,
};
pub use invoice::{CreateInvoice, CreateInvoiceItem, Invoice, InvoiceItem, InvoiceSummary, InvoiceTotals};
pub use receipt::{Receipt, RecordPayment, UpdateReceipt};
pub use staff::{CreateStaff, Staff, StaffRole};
pub use student::{CreateStudent, Student};
