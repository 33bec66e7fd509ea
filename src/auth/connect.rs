//! Connect flow URL construction

use url::Url;

use super::AuthConfig;

/// Permissions requested from the vehicle owner.
pub const CONNECT_SCOPE: &str = "read_vehicle_info read_security control_security";

/// Build the provider authorization URL the user is redirected to.
///
/// `test_mode` selects the provider's simulated vehicles; otherwise the
/// user connects a real vehicle.
pub fn build_connect_url(auth_config: &AuthConfig, test_mode: bool, callback_uri: &str) -> String {
    let mode = if test_mode { "test" } else { "live" };

    let mut url: Url = auth_config.connect_url.url().clone();
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", auth_config.client_id.as_str())
        .append_pair("scope", CONNECT_SCOPE)
        .append_pair("redirect_uri", callback_uri)
        .append_pair("mode", mode)
        .append_pair("remember_creds", "false");

    tracing::trace!("Connect URL is {}", url);
    url.into()
}
