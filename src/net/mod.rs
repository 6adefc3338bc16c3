pub mod packet;
pub mod record;
