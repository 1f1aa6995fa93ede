//! Route paths.

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const POST_AUTH_LOGOUT_ALL: &str = "/auth/logout-all";
pub const POST_AUTH_FORGOT_PASSWORD: &str = "/auth/forgot-password";
pub const POST_AUTH_RESET_PASSWORD: &str = "/auth/reset-password";
pub const GET_AUTH_VERIFY_RESET_TOKEN: &str = "/auth/verify-reset-token/{token}";
pub const GET_AUTH_ME: &str = "/auth/me";
pub const GET_AUTH_SESSION: &str = "/auth/session";
pub const POST_ADMIN_USERS_ID_REVOKE_SESSIONS: &str = "/admin/users/{id}/revoke-sessions";
