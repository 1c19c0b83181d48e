pub mod invoke;
pub mod results;
pub mod router;
