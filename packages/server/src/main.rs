#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime tip intake server binary.

#[actix_web::main]
async fn main() -> Result<(), detective_server::ServerError> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    detective_server::run_server().await
}
