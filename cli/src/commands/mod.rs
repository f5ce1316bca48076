mod feed;
mod helpers;
mod qr;
mod status;

pub(crate) use feed::{cmd_feed, cmd_limit};
pub(crate) use helpers::resolve_password;
pub(crate) use qr::cmd_qr;
pub(crate) use status::{cmd_check_password, cmd_status};
