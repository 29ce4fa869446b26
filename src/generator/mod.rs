//! Service code generation
//!
//! Pure text emission: the wrapper module and the prepared copy of the user's source.
//! Nothing here executes the user's code.

pub mod source;
pub mod wrapper;

use crate::discovery::{DiscoveryError, EndpointDescriptor};
use tracing::debug;

pub use wrapper::WrapperOptions;

pub const WRAPPER_FILE: &str = "flask_app.py";
pub const MODULE_FILE: &str = "user_module.py";

/// Generated Python files for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedService {
    /// Contents of `flask_app.py`
    pub wrapper: String,
    /// Contents of `user_module.py`
    pub module: String,
}

pub fn generate(
    endpoints: &[EndpointDescriptor],
    source: &str,
    options: &WrapperOptions,
) -> Result<GeneratedService, DiscoveryError> {
    let module = source::prepare_module(source)?;
    let wrapper = wrapper::render(endpoints, options);
    debug!(
        endpoints = endpoints.len(),
        observability = options.observability,
        wrapper_bytes = wrapper.len(),
        "Generated service wrapper"
    );
    Ok(GeneratedService { wrapper, module })
}
