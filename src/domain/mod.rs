pub mod errors;
pub mod object_name;
pub mod session;
