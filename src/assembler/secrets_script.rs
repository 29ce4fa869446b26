//! Secrets-staging script (`deploy-with-secrets.sh`)
//!
//! The only artifact that ever holds secret values. It is written inside the attempt
//! workspace with owner-only permissions and removed with it.

use crate::env::EnvEntry;

pub const SECRETS_SCRIPT: &str = "deploy-with-secrets.sh";

/// Single-quotes a value for POSIX shells
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

fn is_shell_word(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders the script, or `None` when there is nothing to stage
pub fn render(flyctl: &str, app: &str, secrets: &[EnvEntry]) -> Option<String> {
    if secrets.is_empty() {
        return None;
    }

    let mut script = String::from(
        "#!/usr/bin/env bash\n\
         # Generated by getmethatdawg: stages secrets, then deploys.\n\
         set -euo pipefail\n\n",
    );
    for entry in secrets {
        let assignment = if is_shell_word(&entry.key) {
            format!("{}={}", entry.key, shell_quote(&entry.value))
        } else {
            shell_quote(&format!("{}={}", entry.key, entry.value))
        };
        script.push_str(&format!(
            "{} secrets set {} --stage --app {}\n",
            flyctl,
            assignment,
            shell_quote(app)
        ));
    }
    script.push_str(&format!(
        "\n{} deploy --remote-only --app {}\n",
        flyctl,
        shell_quote(app)
    ));
    Some(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::classify_text;

    #[test]
    fn test_no_secrets_no_script() {
        let buckets = classify_text("DEBUG=1\n").unwrap();
        assert!(render("flyctl", "app", &buckets.secrets).is_none());
    }

    #[test]
    fn test_quotes_values() {
        let buckets = classify_text("OPENAI_API_KEY=sk-abc\nDB_PASSWORD=it's $HOME\n").unwrap();
        let script = render("flyctl", "my-app", &buckets.secrets).unwrap();
        assert!(script.starts_with("#!/usr/bin/env bash\n"));
        assert!(script.contains("set -euo pipefail\n"));
        assert!(script.contains("flyctl secrets set OPENAI_API_KEY='sk-abc' --stage --app 'my-app'\n"));
        assert!(script.contains("flyctl secrets set DB_PASSWORD='it'\"'\"'s $HOME' --stage --app 'my-app'\n"));
        assert!(script.ends_with("flyctl deploy --remote-only --app 'my-app'\n"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("a'b"), "'a'\"'\"'b'");
    }
}
