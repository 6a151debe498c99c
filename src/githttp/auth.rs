//! Smart-HTTP authentication.
//!
//! Two strategies compose: callers on private networks are let through as
//! `git-user` when auth-on-private-networks is disabled; everyone else
//! must present HTTP Basic credentials with username `git` and the target
//! repository's access key as the password.
//!
//! The observed peer address is treated as authoritative; any
//! `X-Forwarded-For` trust is the upstream proxy's problem.

use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// identity assigned to unauthenticated private-network callers
pub const PRIVATE_NETWORK_USER: &str = "git-user";

/// the only username accepted for Basic auth
const BASIC_USER: &str = "git";

/// outcome of an authentication attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// request may proceed under this identity
    Granted { user: String },
    /// request must be answered with 401
    Denied,
}

/// Whether `ip` falls in the private/loopback ranges that skip Basic auth.
///
/// Covers 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16 and 127.0.0.0/8;
/// IPv6 callers count only when they map onto one of those.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip.to_canonical() {
        IpAddr::V4(v4) => {
            let [a, b, _, _] = v4.octets();
            a == 10 || (a == 172 && (16..=31).contains(&b)) || (a == 192 && b == 168) || a == 127
        }
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

/// Decide whether a Smart-HTTP request may touch the repository.
///
/// `authorization` is the raw `Authorization` header value, if any;
/// `access_key` is the repository's `lunchbadger.accesskey` value.
pub fn authenticate(
    remote: IpAddr,
    authorization: Option<&str>,
    access_key: &str,
    auth_on_private_networks: bool,
) -> AuthOutcome {
    if !auth_on_private_networks && is_private_ip(remote) {
        return AuthOutcome::Granted {
            user: PRIVATE_NETWORK_USER.to_string(),
        };
    }

    let Some((user, password)) = authorization.and_then(parse_basic) else {
        return AuthOutcome::Denied;
    };

    if user == BASIC_USER && password == access_key {
        AuthOutcome::Granted { user }
    } else {
        AuthOutcome::Denied
    }
}

/// Parse a `Basic` authorization header into `(user, password)`.
fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = BASE64.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{user}:{password}")))
    }

    fn public_ip() -> IpAddr {
        "203.0.113.9".parse().unwrap()
    }

    #[test]
    fn test_private_ranges() {
        for ip in ["10.1.2.3", "172.16.0.1", "172.31.255.255", "192.168.1.1", "127.0.0.1"] {
            assert!(is_private_ip(ip.parse().unwrap()), "{ip} should be private");
        }
        for ip in ["172.15.0.1", "172.32.0.1", "192.169.0.1", "8.8.8.8"] {
            assert!(!is_private_ip(ip.parse().unwrap()), "{ip} should be public");
        }
        // v4-mapped addresses canonicalize before the check
        assert!(is_private_ip("::ffff:10.0.0.1".parse().unwrap()));
        assert!(is_private_ip("::1".parse().unwrap()));
    }

    #[test]
    fn test_private_caller_skips_credentials() {
        let outcome = authenticate("10.0.0.5".parse().unwrap(), None, "secret", false);
        assert_eq!(
            outcome,
            AuthOutcome::Granted {
                user: PRIVATE_NETWORK_USER.to_string()
            }
        );
    }

    #[test]
    fn test_private_caller_needs_credentials_when_flag_on() {
        let outcome = authenticate("10.0.0.5".parse().unwrap(), None, "secret", true);
        assert_eq!(outcome, AuthOutcome::Denied);

        let outcome = authenticate(
            "10.0.0.5".parse().unwrap(),
            Some(&basic("git", "secret")),
            "secret",
            true,
        );
        assert!(matches!(outcome, AuthOutcome::Granted { .. }));
    }

    #[test]
    fn test_correct_credentials() {
        let outcome = authenticate(public_ip(), Some(&basic("git", "secret")), "secret", false);
        assert_eq!(
            outcome,
            AuthOutcome::Granted {
                user: "git".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_password_denied() {
        let outcome = authenticate(public_ip(), Some(&basic("git", "nope")), "secret", false);
        assert_eq!(outcome, AuthOutcome::Denied);
    }

    #[test]
    fn test_wrong_user_denied() {
        let outcome = authenticate(public_ip(), Some(&basic("root", "secret")), "secret", false);
        assert_eq!(outcome, AuthOutcome::Denied);
    }

    #[test]
    fn test_missing_or_malformed_header_denied() {
        assert_eq!(authenticate(public_ip(), None, "secret", false), AuthOutcome::Denied);
        assert_eq!(
            authenticate(public_ip(), Some("Bearer token"), "secret", false),
            AuthOutcome::Denied
        );
        assert_eq!(
            authenticate(public_ip(), Some("Basic %%%"), "secret", false),
            AuthOutcome::Denied
        );
    }
}
