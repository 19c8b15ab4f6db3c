use nix::unistd::{geteuid, User};

/// Name of the effective user, falling back to the numeric uid.
pub(crate) fn get_username() -> String {
    let uid = geteuid();
    User::from_uid(uid)
        .ok()
        .flatten()
        .map(|user| user.name)
        .unwrap_or_else(|| uid.to_string())
}
