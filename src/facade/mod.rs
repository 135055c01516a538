pub mod database;
pub mod registrar;

pub use database::{Database, DbConn, DbTx, QueryRows};
pub use registrar::{DRIVER_NAME, open, open_in, register, register_in};
