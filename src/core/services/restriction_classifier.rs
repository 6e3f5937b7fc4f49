use url::Url;

use crate::global_constants::{LOG_TAG_RESTRICTION, RESTRICTED_HOSTS, RESTRICTED_SCHEMES};

/// Whether the host forbids injecting the UI host script into `url`.
/// Absent or unparseable URLs count as restricted.
pub fn is_restricted_url(url: Option<&str>) -> bool {
    let Some(raw_url) = url else {
        return true;
    };

    let parsed = match Url::parse(raw_url) {
        Ok(parsed) => parsed,
        Err(error) => {
            log::debug!(
                "{} Unparseable URL {:?}: {}",
                LOG_TAG_RESTRICTION,
                raw_url,
                error
            );
            return true;
        }
    };

    if RESTRICTED_SCHEMES.contains(&parsed.scheme()) {
        return true;
    }

    parsed
        .host_str()
        .is_some_and(|host| RESTRICTED_HOSTS.contains(&host))
}
