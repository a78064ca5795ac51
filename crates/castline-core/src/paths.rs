use std::env;
use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = ".castline";
const CONFIG_FILE_NAME: &str = "config.json";

/// Return the user's home directory.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<PathBuf, String> {
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| "Home directory not set".to_string())
}

/// `~/.castline/config.json`
pub fn default_config_path() -> Result<PathBuf, String> {
    Ok(get_home_dir()?.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(home: Option<&str>, userprofile: Option<&str>, f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        let prev = (env::var("HOME").ok(), env::var("USERPROFILE").ok());

        set_or_remove("HOME", home);
        set_or_remove("USERPROFILE", userprofile);

        f();

        set_or_remove("HOME", prev.0.as_deref());
        set_or_remove("USERPROFILE", prev.1.as_deref());
    }

    fn set_or_remove(key: &str, value: Option<&str>) {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }

    #[test]
    fn get_home_dir_prefers_home() {
        with_env(Some("/tmp/home"), Some("/tmp/profile"), || {
            assert_eq!(get_home_dir().unwrap(), PathBuf::from("/tmp/home"));
        });
    }

    #[test]
    fn get_home_dir_skips_empty_home() {
        with_env(Some(""), Some("/tmp/profile"), || {
            assert_eq!(get_home_dir().unwrap(), PathBuf::from("/tmp/profile"));
        });
    }

    #[test]
    fn get_home_dir_errors_without_either() {
        with_env(None, None, || {
            assert!(get_home_dir().is_err());
        });
    }

    #[test]
    fn default_config_path_is_under_home() {
        with_env(Some("/tmp/home"), None, || {
            assert_eq!(
                default_config_path().unwrap(),
                PathBuf::from("/tmp/home/.castline/config.json")
            );
        });
    }
}
