pub mod datetime;
pub mod inflect;
