use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WINDOWS_VAR: Regex = Regex::new(r"%([A-Za-z0-9_]+)%").unwrap();
    static ref UNIX_VAR: Regex = Regex::new(r"\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)").unwrap();
}

/// Expand environment variables in a configured path.
///
/// Handles both Windows (`%VAR%`) and Unix (`$VAR`, `${VAR}`) styles so that
/// one config file can carry paths for either OS. Unset variables are left
/// untouched, which keeps a Windows-style path readable when inspected on a
/// Unix host.
pub fn expand_env_vars(path: &str) -> String {
    let pass1 = WINDOWS_VAR.replace_all(path, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    UNIX_VAR
        .replace_all(&pass1, |caps: &regex::Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_unix_var() {
        std::env::set_var("CUSTODIAN_TEST_DIR", "/opt/tools");
        assert_eq!(
            expand_env_vars("$CUSTODIAN_TEST_DIR/fls"),
            "/opt/tools/fls"
        );
        assert_eq!(
            expand_env_vars("${CUSTODIAN_TEST_DIR}/fls"),
            "/opt/tools/fls"
        );
    }

    #[test]
    fn test_expand_windows_var() {
        std::env::set_var("CUSTODIAN_TEST_WIN", "C:\\Tools");
        assert_eq!(
            expand_env_vars("%CUSTODIAN_TEST_WIN%\\fls.exe"),
            "C:\\Tools\\fls.exe"
        );
    }

    #[test]
    fn test_unset_vars_left_untouched() {
        assert_eq!(
            expand_env_vars("%NO_SUCH_CUSTODIAN_VAR%\\x"),
            "%NO_SUCH_CUSTODIAN_VAR%\\x"
        );
        assert_eq!(
            expand_env_vars("$NO_SUCH_CUSTODIAN_VAR/x"),
            "$NO_SUCH_CUSTODIAN_VAR/x"
        );
    }

    #[test]
    fn test_plain_path_unchanged() {
        assert_eq!(expand_env_vars("/usr/bin/tshark"), "/usr/bin/tshark");
    }
}
