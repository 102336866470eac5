pub mod fetch;
pub mod sheet;
