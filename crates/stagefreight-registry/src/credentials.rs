//! Env-prefix credential resolution (§4.10): given `P`, read `P_USER` and
//! `P_PASS`; GitLab additionally honors `GITLAB_TOKEN`, falling back to
//! `CI_JOB_TOKEN`.

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn is_present(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Resolves `<prefix>_USER`/`<prefix>_PASS` from the environment.
pub fn resolve(prefix: &str) -> Credentials {
    Credentials {
        username: std::env::var(format!("{prefix}_USER")).ok(),
        password: std::env::var(format!("{prefix}_PASS")).ok(),
    }
}

/// As [`resolve`], but for GitLab: prefers a bare `GITLAB_TOKEN`, falling
/// back to `CI_JOB_TOKEN` when unset, using either as the password half of
/// an otherwise-normal user/pass pair (GitLab accepts any non-empty
/// username alongside a PAT/job token).
pub fn resolve_gitlab(prefix: &str) -> Credentials {
    let mut creds = resolve(prefix);
    if creds.password.is_none() {
        creds.password = std::env::var("GITLAB_TOKEN").ok().or_else(|| std::env::var("CI_JOB_TOKEN").ok());
        if creds.password.is_some() && creds.username.is_none() {
            creds.username = Some("gitlab-ci-token".to_string());
        }
    }
    creds
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn resolves_user_and_pass_from_prefix() {
        unsafe {
            env::set_var("TESTPFX_USER", "alice");
            env::set_var("TESTPFX_PASS", "hunter2");
        }
        let creds = resolve("TESTPFX");
        unsafe {
            env::remove_var("TESTPFX_USER");
            env::remove_var("TESTPFX_PASS");
        }
        assert_eq!(creds.username.as_deref(), Some("alice"));
        assert_eq!(creds.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn gitlab_falls_back_to_ci_job_token() {
        unsafe {
            env::remove_var("GLPFX_PASS");
            env::remove_var("GITLAB_TOKEN");
            env::set_var("CI_JOB_TOKEN", "job-token-abc");
        }
        let creds = resolve_gitlab("GLPFX");
        unsafe {
            env::remove_var("CI_JOB_TOKEN");
        }
        assert_eq!(creds.password.as_deref(), Some("job-token-abc"));
        assert_eq!(creds.username.as_deref(), Some("gitlab-ci-token"));
    }
}
