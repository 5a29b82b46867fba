pub mod backend;
pub mod excel;
pub mod export;
pub mod import;
