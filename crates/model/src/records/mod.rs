pub mod cursor;
pub mod row;
pub mod table;
