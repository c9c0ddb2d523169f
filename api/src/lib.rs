//#![allow(clippy::missing_errors_doc)]

#[cfg(not(feature = "unsafe"))]
#[allow(non_camel_case_types, non_upper_case_globals,
    non_snake_case, dead_code,
    clippy::missing_safety_doc, clippy::unreadable_literal,
    clippy::pub_underscore_fields)]
mod cbindings;

#[cfg(feature = "unsafe")]
#[allow(non_camel_case_types, non_upper_case_globals,
    non_snake_case, dead_code,
    clippy::missing_safety_doc, clippy::unreadable_literal,
    clippy::pub_underscore_fields, clippy::must_use_candidate)]
pub mod cbindings;

#[cfg(feature = "safe")]
mod safe_api;

#[cfg(feature = "safe")]
pub use safe_api::*;

pub mod misc;

/// The raw pieces the launcher needs to resolve and call runtime exports.
pub mod c {
    pub use super::cbindings::CreateJavaVmFn;
    pub use super::cbindings::GetDefaultJavaVmInitArgsFn;
    pub use super::cbindings::jclass;
    pub use super::cbindings::jvalue;
}
