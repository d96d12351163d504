pub mod excel_write;
pub mod ldif_read;
pub mod ldif_write;
