//! Route paths.

pub const POST_AUTH_REGISTER: &str = "/auth/register";
pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const GET_AUTH_ME: &str = "/auth/me";
pub const POST_AUTH_FORGOT_PASSWORD: &str = "/auth/forgot-password";
pub const POST_AUTH_RESET_PASSWORD: &str = "/auth/reset-password";
pub const POST_AUTH_VERIFY_EMAIL: &str = "/auth/verify-email";
pub const POST_AUTH_RESEND_VERIFICATION: &str = "/auth/resend-verification";
