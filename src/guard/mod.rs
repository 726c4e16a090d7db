//! Route classification and access decisions.
//!
//! Everything here is pure: [`RouteRules::classify`] maps a path to a
//! [`RouteClass`] and [`RouteRules::decide`] maps a class plus the current
//! session to a [`GuardDecision`]. The axum layer lives in [`middleware`].

pub mod middleware;

use std::collections::BTreeSet;

use crate::roles::{Role, RoleRequirement};
use crate::session::Session;

pub const USER_ID_HEADER: &str = "x-storefront-user-id";
pub const USER_ROLES_HEADER: &str = "x-storefront-user-roles";

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";
pub const ACCESS_DENIED_PATH: &str = "/access-denied";

/// Longest callback target carried through login.
pub const MAX_CALLBACK_LEN: usize = 512;

const AUTH_PAGES: &[&str] = &["/login", "/register", "/forgot-password"];

const STATIC_EXTENSIONS: &[&str] = &[
    "js", "mjs", "css", "map", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "avif",
    "woff", "woff2", "ttf", "otf", "txt", "xml", "webmanifest",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass {
    /// Never inspected: assets, framework internals, the auth endpoints themselves.
    Bypass,
    /// Open to everyone.
    Public,
    /// Login and registration forms; authenticated users are sent home.
    AuthPage,
    /// Needs a session, and a role when `requirement` is set.
    Protected { requirement: Option<RoleRequirement> },
}

/// Authenticated caller as seen by downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub roles: BTreeSet<Role>,
    pub email: Option<String>,
}

impl Identity {
    pub fn from_session(session: &Session) -> Self {
        Self {
            subject: session.subject.clone(),
            roles: session.roles.clone(),
            email: session.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow(Option<Identity>),
    RedirectHome,
    RedirectToLogin { callback_url: String },
    /// API path without a usable session.
    Unauthorized { session_error: bool },
    /// Authenticated but missing the required role.
    Forbidden { api: bool },
}

/// Path rules, checked in order: bypass, public, auth pages, role prefixes.
#[derive(Debug, Clone)]
pub struct RouteRules {
    pub bypass_prefixes: Vec<String>,
    pub bypass_files: Vec<String>,
    pub public_prefixes: Vec<String>,
    pub auth_pages: Vec<String>,
    pub role_prefixes: Vec<(String, RoleRequirement)>,
}

impl Default for RouteRules {
    fn default() -> Self {
        let admin = RoleRequirement::any_of(&[Role::Admin]);
        let seller = RoleRequirement::any_of(&[Role::Seller, Role::Admin]);
        let delivery = RoleRequirement::any_of(&[Role::DeliveryAgent, Role::Admin]);

        Self {
            bypass_prefixes: strings(&[
                "/_next",
                "/static",
                "/assets",
                "/images",
                "/fonts",
                "/icons",
                "/api/auth",
                "/health",
            ]),
            bypass_files: strings(&[
                "/favicon.ico",
                "/robots.txt",
                "/sitemap.xml",
                "/manifest.json",
                "/sw.js",
            ]),
            public_prefixes: strings(&[
                "/",
                "/products",
                "/product",
                "/categories",
                "/category",
                "/search",
                "/about",
                "/contact",
                "/faq",
                "/terms",
                "/privacy",
                "/access-denied",
                "/api/products",
                "/api/categories",
                "/api/search",
                "/api/webhooks",
            ]),
            auth_pages: strings(AUTH_PAGES),
            role_prefixes: vec![
                ("/admin".into(), admin.clone()),
                ("/api/admin".into(), admin),
                ("/seller".into(), seller.clone()),
                ("/api/seller".into(), seller),
                ("/delivery".into(), delivery.clone()),
                ("/api/delivery".into(), delivery),
            ],
        }
    }
}

impl RouteRules {
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = normalize(path);

        if self.bypass_files.iter().any(|f| *f == path)
            || self.bypass_prefixes.iter().any(|p| matches_prefix(&path, p))
        {
            return RouteClass::Bypass;
        }

        let role = self
            .role_prefixes
            .iter()
            .find(|(prefix, _)| matches_prefix(&path, prefix))
            .map(|(_, requirement)| requirement.clone());

        // Only top-level files; nested ones like `/orders/invoice.txt` stay gated.
        if role.is_none() && !is_api(&path) && is_top_level_asset(&path) {
            return RouteClass::Bypass;
        }
        if self.public_prefixes.iter().any(|p| matches_prefix(&path, p)) {
            return RouteClass::Public;
        }
        if self.auth_pages.iter().any(|p| matches_prefix(&path, p)) {
            return RouteClass::AuthPage;
        }
        RouteClass::Protected { requirement: role }
    }

    /// Decide what to do with a request.
    ///
    /// `target` is the original path and query, used as the login callback.
    /// An errored session counts as no session.
    pub fn decide(&self, class: &RouteClass, target: &str, session: Option<&Session>) -> GuardDecision {
        let authenticated = session.filter(|s| s.is_authenticated());
        let api = is_api(&normalize(path_only(target)));

        match class {
            RouteClass::Bypass => GuardDecision::Allow(None),
            RouteClass::Public => GuardDecision::Allow(authenticated.map(Identity::from_session)),
            RouteClass::AuthPage => match authenticated {
                Some(_) => GuardDecision::RedirectHome,
                None => GuardDecision::Allow(None),
            },
            RouteClass::Protected { requirement } => {
                let Some(session) = authenticated else {
                    return if api {
                        GuardDecision::Unauthorized {
                            session_error: session.is_some(),
                        }
                    } else {
                        GuardDecision::RedirectToLogin {
                            callback_url: sanitize_callback_url(Some(target)),
                        }
                    };
                };
                match requirement {
                    Some(req) if !req.is_satisfied_by(&session.roles) => GuardDecision::Forbidden { api },
                    _ => GuardDecision::Allow(Some(Identity::from_session(session))),
                }
            }
        }
    }
}

/// Reduce a post-login redirect target to a safe same-origin path.
///
/// Anything that is not a plain relative path, is too long, or points at
/// an API route or an auth page becomes `/`.
pub fn sanitize_callback_url(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return HOME_PATH.into();
    };
    if raw.len() > MAX_CALLBACK_LEN
        || !raw.starts_with('/')
        || raw.starts_with("//")
        || raw.contains('\\')
        || raw.chars().any(char::is_control)
    {
        return HOME_PATH.into();
    }

    let path = normalize(path_only(raw));
    if is_api(&path) || AUTH_PAGES.iter().any(|p| matches_prefix(&path, p)) {
        return HOME_PATH.into();
    }
    raw.to_string()
}

pub fn is_api(normalized_path: &str) -> bool {
    matches_prefix(normalized_path, "/api")
}

/// Segment-aware prefix match: `/admin` matches `/admin` and `/admin/x`,
/// not `/administrator`. The root prefix only matches the root itself.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Lowercase, collapse repeated slashes, drop the trailing slash.
fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(&segment.to_lowercase());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

fn path_only(target: &str) -> &str {
    target
        .split(['?', '#'])
        .next()
        .unwrap_or(target)
}

fn is_top_level_asset(path: &str) -> bool {
    let Some(file) = path.strip_prefix('/').filter(|rest| !rest.contains('/')) else {
        return false;
    };
    file.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && STATIC_EXTENSIONS.contains(&ext))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
