pub mod check_oracle;
pub mod init;
pub mod take;
pub mod validate;
