pub mod outcome;
pub mod response;
