//! Parameterized shell command builders.
//!
//! Every argument passes through `shell::quote_*`, so option values coming
//! from config or flags can never splice extra shell syntax into a command.

use crate::utils::shell;

/// Download `url` to `dest`, following redirects and failing on HTTP errors.
pub fn download(url: &str, dest: &str) -> String {
    format!(
        "curl -fsSL -o {} {}",
        shell::quote_path(dest),
        shell::quote_arg(url)
    )
}

pub fn make_dir(path: &str) -> String {
    format!("mkdir -p {}", shell::quote_path(path))
}

/// Extract a gzipped tarball into `dest_dir`.
pub fn extract_tarball(archive: &str, dest_dir: &str) -> String {
    format!(
        "tar xzf {} -C {}",
        shell::quote_path(archive),
        shell::quote_path(dest_dir)
    )
}

/// First entry of the current directory whose name contains `needle`.
pub fn find_entry(needle: &str) -> String {
    format!("ls | grep -F {} | head -n 1", shell::quote_arg(needle))
}

pub fn move_path(from: &str, to: &str) -> String {
    format!(
        "mv {} {}",
        shell::quote_path(from),
        shell::quote_path(to)
    )
}

/// Move `from` to the first free `{base}-N` (N from 1), chosen on the remote side.
pub fn move_to_numbered(from: &str, base: &str) -> String {
    let base = shell::quote_path(base);
    format!(
        "n=1 && while [ -e {base}-\"$n\" ] || [ -L {base}-\"$n\" ]; do n=$((n+1)); done && mv {from} {base}-\"$n\"",
        base = base,
        from = shell::quote_path(from)
    )
}

pub fn remove_tree(path: &str) -> String {
    format!("rm -rf {}", shell::quote_path(path))
}

/// Mirror the contents of `from` into `to`, preserving permissions.
pub fn sync_dir(from: &str, to: &str) -> String {
    format!(
        "rsync -pr {} {}",
        shell::quote_path(&with_trailing_slash(from)),
        shell::quote_path(&with_trailing_slash(to))
    )
}

/// Mirror `from` into `to`, skipping entries that match `exclude`.
pub fn sync_dir_excluding(from: &str, to: &str, exclude: &str) -> String {
    format!(
        "rsync -a --exclude {} {} {}",
        shell::quote_arg(exclude),
        shell::quote_path(&with_trailing_slash(from)),
        shell::quote_path(&with_trailing_slash(to))
    )
}

/// Create `user` with `home_dir` unless the account already exists.
pub fn ensure_user(user: &str, home_dir: &str) -> String {
    let user = shell::quote_arg(user);
    format!(
        "id -u {user} >/dev/null 2>&1 || useradd --home-dir {home} {user}",
        user = user,
        home = shell::quote_path(home_dir)
    )
}

/// Non-interactive apt install.
pub fn apt_install(package: &str) -> String {
    format!(
        "DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
        shell::quote_arg(package)
    )
}

pub fn service(name: &str, action: &str) -> String {
    shell::quote_args(&["service", name, action])
}

pub fn register_init_script(name: &str) -> String {
    shell::quote_args(&["update-rc.d", name, "defaults"])
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_quotes_url_with_query() {
        assert_eq!(
            download("https://host/nexus.tgz?a=1&b=2", "10-18-26-nexus.tgz"),
            "curl -fsSL -o '10-18-26-nexus.tgz' 'https://host/nexus.tgz?a=1&b=2'"
        );
    }

    #[test]
    fn move_path_quotes_both_sides() {
        assert_eq!(
            move_path("nexus-current", "nexus-old-10-18-26"),
            "mv 'nexus-current' 'nexus-old-10-18-26'"
        );
    }

    #[test]
    fn numbered_move_probes_for_a_free_suffix() {
        assert_eq!(
            move_to_numbered("nexus-current", "nexus-old-10-18-26"),
            "n=1 && while [ -e 'nexus-old-10-18-26'-\"$n\" ] || [ -L 'nexus-old-10-18-26'-\"$n\" ]; \
             do n=$((n+1)); done && mv 'nexus-current' 'nexus-old-10-18-26'-\"$n\""
        );
    }

    #[test]
    fn hostile_user_name_stays_inert() {
        let cmd = ensure_user("nexus; rm -rf /", "/data/nexus");
        assert_eq!(
            cmd,
            "id -u 'nexus; rm -rf /' >/dev/null 2>&1 || useradd --home-dir '/data/nexus' 'nexus; rm -rf /'"
        );
    }

    #[test]
    fn sync_dir_copies_contents_not_directory() {
        assert_eq!(
            sync_dir("nexus-old-10-18-26/conf", "nexus-current/conf/"),
            "rsync -pr 'nexus-old-10-18-26/conf/' 'nexus-current/conf/'"
        );
    }

    #[test]
    fn sync_dir_excluding_adds_filter() {
        assert_eq!(
            sync_dir_excluding("conf", "conf/conf-backup-x-", "conf-backup-*"),
            "rsync -a --exclude 'conf-backup-*' 'conf/' 'conf/conf-backup-x-/'"
        );
    }

    #[test]
    fn find_entry_uses_fixed_string_grep() {
        assert_eq!(find_entry("nexus"), "ls | grep -F nexus | head -n 1");
    }

    #[test]
    fn service_and_packages() {
        assert_eq!(service("nexus", "stop"), "service nexus stop");
        assert_eq!(
            apt_install("openjdk-7-jre-headless"),
            "DEBIAN_FRONTEND=noninteractive apt-get install -y openjdk-7-jre-headless"
        );
        assert_eq!(register_init_script("nexus"), "update-rc.d nexus defaults");
    }
}
