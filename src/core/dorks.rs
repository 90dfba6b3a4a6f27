// src/core/dorks.rs

use tracing::{debug, info};

/// A generated search query targeting one class of exposed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DorkQuery {
    /// Content class the query hunts for (used for logging only).
    pub category: &'static str,
    /// The final query text handed to the search gateway.
    pub query: String,
}

/// One dork template. `{domain}` is substituted with the sanitized target,
/// so adding a category is a data change, not a code change.
struct DorkRule {
    category: &'static str,
    template: &'static str,
}

/// The rule set driving query generation. Each entry scopes the search to
/// the target via `site:` and layers the operators for its content class.
static DORK_RULES: &[DorkRule] = &[
    DorkRule {
        category: "sensitive-files",
        template: r#"site:{domain} ext:sql | ext:env | ext:log | ext:bak | ext:old | ext:backup "password" | "passwd" | "pwd""#,
    },
    DorkRule {
        category: "admin-panels",
        template: r#"site:{domain} inurl:admin | inurl:login | inurl:wp-admin | intitle:"admin panel""#,
    },
    DorkRule {
        category: "open-directories",
        template: r#"site:{domain} intitle:"index of" "backup" | ".zip" | ".tar" | ".gz""#,
    },
    DorkRule {
        category: "config-leaks",
        template: r#"site:{domain} filetype:conf | filetype:cnf | filetype:ini | filetype:xml "password""#,
    },
];

/// Builds the dork query set for a target domain. Pure; never fails.
pub fn generate_dorks(domain: &str) -> Vec<DorkQuery> {
    let clean = sanitize_domain(domain);
    let queries: Vec<DorkQuery> = DORK_RULES
        .iter()
        .map(|rule| {
            let query = rule.template.replace("{domain}", &clean);
            debug!(category = rule.category, query = %query, "Generated dork query.");
            DorkQuery {
                category: rule.category,
                query,
            }
        })
        .collect();
    info!(domain = %clean, count = queries.len(), "Dork query set generated.");
    queries
}

/// Reduces raw user input to a bare host name safe to splice into a query
/// template: scheme and `www.` prefixes are stripped, and any character
/// that could act as a search operator is removed.
pub fn sanitize_domain(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.");
    // Keep only characters that are legal in a host name.
    let host_end = trimmed.find(['/', '?', '#']).unwrap_or(trimmed.len());
    trimmed[..host_end]
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_at_least_two_queries_containing_the_domain() {
        let queries = generate_dorks("example.com");
        assert!(queries.len() >= 2);
        for dork in &queries {
            assert!(
                dork.query.contains("example.com"),
                "query `{}` does not embed the domain",
                dork.query
            );
        }
    }

    #[test]
    fn covers_sensitive_files_and_admin_interfaces() {
        let queries = generate_dorks("example.com");
        assert!(queries.iter().any(|q| q.category == "sensitive-files"));
        assert!(queries.iter().any(|q| q.category == "admin-panels"));
    }

    #[test]
    fn sanitize_strips_scheme_and_path() {
        assert_eq!(sanitize_domain("https://www.example.com/path?q=1"), "example.com");
        assert_eq!(sanitize_domain("http://sub.example.org"), "sub.example.org");
    }

    #[test]
    fn sanitize_removes_operator_metacharacters() {
        assert_eq!(
            sanitize_domain("exa mple.com\" | intitle:admin"),
            "example.comintitleadmin"
        );
        assert_eq!(sanitize_domain("example.com)"), "example.com");
    }

    #[test]
    fn queries_scope_to_the_sanitized_domain() {
        let queries = generate_dorks("https://example.com/ignored");
        for dork in &queries {
            assert!(dork.query.contains("site:example.com"));
        }
    }
}
