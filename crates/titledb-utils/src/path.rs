//! Expansion of user supplied locations (config values, CLI arguments).

use std::{env, path::PathBuf};

use crate::{
    error::{PathError, PathResult},
    user::get_username,
};

/// `$HOME`, or `/home/<user>` when it is unset.
pub fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/home").join(get_username()))
}

fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    env::var_os(var)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(fallback))
}

pub fn xdg_config_home() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

pub fn xdg_data_home() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// Expands a leading `~`, `$VAR` and `${VAR}`, then anchors relative results
/// at the current directory.
///
/// `HOME` and the XDG variables fall back to their defaults when unset; any
/// other unset variable is an error.
///
/// ```
/// use titledb_utils::path::resolve_path;
///
/// let path = resolve_path("/srv/titledb").unwrap();
/// assert_eq!(path, std::path::PathBuf::from("/srv/titledb"));
/// ```
pub fn resolve_path(input: &str) -> PathResult<PathBuf> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    let path = PathBuf::from(expand(input)?);
    if path.is_absolute() {
        return Ok(path);
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|source| PathError::CurrentDir { source })
}

fn lookup(var: &str, input: &str) -> PathResult<String> {
    let dir = match var {
        "HOME" => home_dir(),
        "XDG_CONFIG_HOME" => xdg_config_home(),
        "XDG_DATA_HOME" => xdg_data_home(),
        _ => {
            return env::var(var).map_err(|_| PathError::MissingEnvVar {
                var: var.to_string(),
                input: input.to_string(),
            })
        }
    };
    Ok(dir.to_string_lossy().into_owned())
}

fn expand(input: &str) -> PathResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    if let Some(tail) = rest.strip_prefix('~') {
        if tail.is_empty() || tail.starts_with('/') {
            out.push_str(&home_dir().to_string_lossy());
            rest = tail;
        }
    }

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| PathError::UnclosedVariable {
                input: input.to_string(),
            })?;
            out.push_str(&lookup(&braced[..end], input)?);
            rest = &braced[end + 1..];
        } else {
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if len == 0 {
                out.push('$');
            } else {
                out.push_str(&lookup(&after[..len], input)?);
            }
            rest = &after[len..];
        }
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    /// Sets variables for the duration of a test and restores them on drop.
    struct ScopedEnv(Vec<(&'static str, Option<String>)>);

    impl ScopedEnv {
        fn new(vars: &[(&'static str, Option<&str>)]) -> Self {
            let saved = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();
            for (key, value) in vars {
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
            Self(saved)
        }
    }

    impl Drop for ScopedEnv {
        fn drop(&mut self) {
            for (key, value) in &self.0 {
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    #[serial]
    fn test_expand_variables() {
        let _env = ScopedEnv::new(&[("TITLEDB_TEST_DIR", Some("/srv/db"))]);

        assert_eq!(expand("$TITLEDB_TEST_DIR/titles").unwrap(), "/srv/db/titles");
        assert_eq!(expand("${TITLEDB_TEST_DIR}x").unwrap(), "/srv/dbx");
        assert_eq!(expand("a$/b").unwrap(), "a$/b");
        assert!(matches!(
            expand("${TITLEDB_TEST_DIR"),
            Err(PathError::UnclosedVariable { .. })
        ));
        assert!(matches!(
            expand("$TITLEDB_SURELY_UNSET/x"),
            Err(PathError::MissingEnvVar { ref var, .. }) if var == "TITLEDB_SURELY_UNSET"
        ));
    }

    #[test]
    #[serial]
    fn test_tilde_only_at_start() {
        let _env = ScopedEnv::new(&[("HOME", Some("/tmp/home"))]);

        assert_eq!(expand("~").unwrap(), "/tmp/home");
        assert_eq!(expand("~/titledb").unwrap(), "/tmp/home/titledb");
        assert_eq!(expand("a/~/b").unwrap(), "a/~/b");
        assert_eq!(expand("~user").unwrap(), "~user");
    }

    #[test]
    #[serial]
    fn test_xdg_directories() {
        let _env = ScopedEnv::new(&[
            ("HOME", Some("/tmp/home")),
            ("XDG_CONFIG_HOME", None),
            ("XDG_DATA_HOME", Some("")),
        ]);
        assert_eq!(xdg_config_home(), PathBuf::from("/tmp/home/.config"));
        assert_eq!(xdg_data_home(), PathBuf::from("/tmp/home/.local/share"));
        assert_eq!(expand("$XDG_DATA_HOME/titledb").unwrap(), "/tmp/home/.local/share/titledb");

        let _xdg = ScopedEnv::new(&[("XDG_DATA_HOME", Some("/tmp/data"))]);
        assert_eq!(xdg_data_home(), PathBuf::from("/tmp/data"));
    }

    #[test]
    #[serial]
    fn test_resolve_path() {
        let _env = ScopedEnv::new(&[("HOME", Some("/tmp/home"))]);

        assert!(matches!(resolve_path("  "), Err(PathError::Empty)));
        assert_eq!(resolve_path("/srv/db").unwrap(), PathBuf::from("/srv/db"));
        assert_eq!(resolve_path(" ~/db ").unwrap(), PathBuf::from("/tmp/home/db"));
        assert_eq!(
            resolve_path("relative").unwrap(),
            env::current_dir().unwrap().join("relative")
        );
    }
}
