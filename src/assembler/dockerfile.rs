//! Container build descriptor

use super::requirements::MANIFEST_FILE;
use super::secrets_script::SECRETS_SCRIPT;
use crate::credential::CREDENTIAL_FILE;
use crate::generator::{MODULE_FILE, WRAPPER_FILE};

pub const DOCKERFILE: &str = "Dockerfile";
pub const DOCKERIGNORE: &str = ".dockerignore";

/// Renders the Dockerfile; it never carries environment values, plain or secret
pub fn render(base_image: &str, port: u16) -> String {
    format!(
        "FROM {base_image}\n\
         \n\
         WORKDIR /app\n\
         \n\
         COPY {MANIFEST_FILE} .\n\
         RUN pip install --no-cache-dir -r {MANIFEST_FILE}\n\
         \n\
         COPY {MODULE_FILE} .\n\
         COPY {WRAPPER_FILE} .\n\
         \n\
         EXPOSE {port}\n\
         \n\
         CMD [\"python\", \"{WRAPPER_FILE}\"]\n"
    )
}

/// Keeps the staging script and exported credential out of the build context
pub fn render_ignore() -> String {
    format!("{SECRETS_SCRIPT}\n{CREDENTIAL_FILE}\n.env\n*.env\n")
}
