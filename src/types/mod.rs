// ABOUTME: Validated domain types shared across the pipeline.
// ABOUTME: Service names, image references, and SSH remote host addresses.

mod image_ref;
mod remote_host;
mod service_name;

pub use image_ref::{ImageRef, ParseImageRefError};
pub use remote_host::{ParseRemoteHostError, RemoteHost};
pub use service_name::{ServiceName, ServiceNameError};
