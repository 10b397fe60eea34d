pub mod reliability;
pub mod usercases;
