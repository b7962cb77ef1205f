//! The built-in `allow-types` plugin.
//!
//! Configured with the list of request kinds it lets through; every
//! other kind is denied. This is the workhorse for read-only mirrors
//! and upload-only drop boxes.

use crate::error::PluginError;
use crate::v1::{AuthorizeRequest, RequestType};
use tonic::Status;

#[derive(Debug)]
pub struct AllowTypesPlugin {
    allowed: Vec<RequestType>,
}

/// Parse a configuration token into a request kind.
///
/// `get_tags` is accepted as an alias of `get_metadata`; it predates the
/// metadata endpoint and existing configurations still use it.
fn parse_request_type(token: &str) -> Result<RequestType, PluginError> {
    match token {
        "download" => Ok(RequestType::Download),
        "upload" => Ok(RequestType::Upload),
        "get_metadata" | "get_tags" => Ok(RequestType::GetMetadata),
        "list" => Ok(RequestType::List),
        other => Err(PluginError::Config(format!(
            "unknown request type: {other}"
        ))),
    }
}

impl AllowTypesPlugin {
    pub fn new(args: &[String]) -> Result<Self, PluginError> {
        if args.is_empty() {
            return Err(PluginError::Config(
                "at least one request type is required".to_string(),
            ));
        }

        let allowed = args
            .iter()
            .map(|arg| parse_request_type(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { allowed })
    }

    pub fn authorize(&self, request: &AuthorizeRequest) -> Result<(), Status> {
        if self.allowed.contains(&request.request_type()) {
            Ok(())
        } else {
            Err(Status::permission_denied("request type is not allowed"))
        }
    }
}
