pub mod layout;
pub mod lock;
pub mod reader;
pub mod writer;
