use nix::unistd::{getgid, getuid, Group, User};

/// Identity of the invoking user, forwarded to builds so the image can
/// create a matching account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUser {
    pub uid: u32,
    pub user: String,
    pub gid: u32,
    pub group: String,
}

impl HostUser {
    pub fn current() -> Self {
        let uid = getuid();
        let gid = getgid();
        // Accounts missing from the passwd/group databases fall back to
        // their numeric id.
        let user = User::from_uid(uid)
            .ok()
            .flatten()
            .map_or_else(|| uid.to_string(), |u| u.name);
        let group = Group::from_gid(gid)
            .ok()
            .flatten()
            .map_or_else(|| gid.to_string(), |g| g.name);
        Self {
            uid: uid.as_raw(),
            user,
            gid: gid.as_raw(),
            group,
        }
    }

    /// The `UI`, `UN`, `GI` and `GN` build args.
    pub fn build_args(&self) -> Vec<(String, String)> {
        vec![
            ("UI".to_owned(), self.uid.to_string()),
            ("UN".to_owned(), self.user.clone()),
            ("GI".to_owned(), self.gid.to_string()),
            ("GN".to_owned(), self.group.clone()),
        ]
    }
}
