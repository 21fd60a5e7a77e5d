pub mod dnsbl_cmd;
pub mod geo_cmd;
pub mod inspect_cmd;

pub use dnsbl_cmd::{cmd_check_update, cmd_dump, cmd_test, ListArgs};
pub use geo_cmd::{cmd_geo, GeoArgs};
pub use inspect_cmd::cmd_inspect;
