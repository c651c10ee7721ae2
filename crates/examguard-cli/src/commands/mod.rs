pub mod certificate;
pub mod init;
pub mod new_code;
pub mod results;
pub mod take;
pub mod validate;
