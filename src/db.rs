pub mod store;
pub mod item_repo;
pub use item_repo::ItemRepository;
pub mod audit_repo;
pub use audit_repo::AuditRepository;
pub mod user_repo;
pub use user_repo::UserRepository;
pub mod unit_repo;
pub use unit_repo::UnitRepository;
pub mod pg_store;
pub use pg_store::PgLedgerStore;

#[cfg(test)]
pub mod memory_store;
