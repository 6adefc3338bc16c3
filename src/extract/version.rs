use std::io::BufRead;

use crate::error::ExtractError;
use crate::extract::Pass;
use crate::protocol::Event;

pub const CLIENT_VERSION: &str = "client_version";

/// Client version from the first login record. Versions below `minimum`
/// are rejected.
pub fn detect<R: BufRead>(pass: &mut Pass<'_, R>, minimum: u16) -> Result<u16, ExtractError> {
    while let Some((_, event)) = pass.next_event()? {
        let Event::ClientVersion(found) = event else {
            continue;
        };
        if found < minimum {
            return Err(ExtractError::VersionUnsupported { found, minimum });
        }
        return Ok(found);
    }
    Err(ExtractError::VersionNotFound)
}
