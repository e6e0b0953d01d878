pub mod coordinate;
pub mod observation;
pub mod period;
pub mod postal_code;
pub mod series;
pub mod station;
