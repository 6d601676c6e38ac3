pub mod billing;
pub mod dashboard;
pub mod dues;
pub mod invoices;
pub mod receipts;
pub mod staff;
pub mod students;
