pub mod rates;
pub mod session;
pub mod trip;
