use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::API_V1_PREFIX;

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

pub fn auth_login(base: &str) -> String {
    base_join(base, &format!("{}/auth/login", API_V1_PREFIX))
}
pub fn users(base: &str) -> String {
    base_join(base, &format!("{}/users", API_V1_PREFIX))
}
pub fn family(base: &str, username: &str) -> String {
    base_join(base, &format!("{}/families/{}", API_V1_PREFIX, enc(username)))
}
pub fn kid(base: &str, kid_username: &str) -> String {
    base_join(base, &format!("{}/kids/{}", API_V1_PREFIX, enc(kid_username)))
}
pub fn kid_height(base: &str, kid_username: &str) -> String {
    base_join(
        base,
        &format!("{}/kids/{}/height", API_V1_PREFIX, enc(kid_username)),
    )
}
pub fn kid_height_record(base: &str, kid_username: &str, id: i32) -> String {
    base_join(
        base,
        &format!("{}/kids/{}/height/{}", API_V1_PREFIX, enc(kid_username), id),
    )
}
pub fn kid_history(base: &str, kid_username: &str) -> String {
    base_join(
        base,
        &format!("{}/kids/{}/history", API_V1_PREFIX, enc(kid_username)),
    )
}
pub fn kid_session(base: &str, kid_username: &str) -> String {
    base_join(
        base,
        &format!("{}/kids/{}/session", API_V1_PREFIX, enc(kid_username)),
    )
}
