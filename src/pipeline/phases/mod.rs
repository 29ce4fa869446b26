// Deployment phases, one per pipeline state, in execution order.

#[path = "01_analyze.rs"]
pub mod analyze;
#[path = "02_pre_auth_resolve.rs"]
pub mod pre_auth_resolve;
#[path = "03_build_image.rs"]
pub mod build_image;
#[path = "04_create_or_update_app.rs"]
pub mod create_or_update_app;
#[path = "05_stage_secrets.rs"]
pub mod stage_secrets;
#[path = "06_deploy.rs"]
pub mod deploy;
#[path = "07_verify.rs"]
pub mod verify;
