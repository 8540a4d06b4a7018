//! ZwiftPower portal constants

/// Portal origin
pub const PORTAL_BASE_URL: &str = "https://zwiftpower.com";

/// SSO-initiation path on the portal (phpBB external OAuth login)
pub const LOGIN_START_PATH: &str = "/ucp.php?mode=login&login=external&oauth_service=oauthzpsso";

/// Host the login form submit is pinned to
pub const LOGIN_HOST: &str = "secure.zwift.com";

/// phpBB session-id cookie
pub const SESSION_COOKIE: &str = "phpbb3_lswlk_sid";

/// phpBB user-id cookie; `"1"` is the anonymous placeholder
pub const USER_COOKIE: &str = "phpbb3_lswlk_u";
pub const ANONYMOUS_USER_ID: &str = "1";

/// Accept header sent with the login form submit
pub const LOGIN_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
