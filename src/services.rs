pub mod auth;
pub mod recipient;
pub mod history;
pub mod notification_service;
pub use notification_service::NotificationService;
pub mod ledger_service;
pub use ledger_service::LedgerService;
pub mod dashboard_service;
pub use dashboard_service::DashboardService;
